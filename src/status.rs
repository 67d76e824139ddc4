//! Process-wide connection status.
//!
//! One instance lives for the whole process. The bring-up state machine
//! and the supervisor are its only writers; HTTP handlers and the LED
//! ticker are read-only observers.

use std::sync::{Arc, Mutex};

use serde::Serialize;

/// High-level indicator state, always derived from [`Status`] plus the
/// current activity snapshot. Never set directly by the LED driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    #[default]
    Startup,
    Connecting,
    Connected,
    Error,
    DataActive,
}

#[derive(Debug, Default)]
pub struct Status {
    /// True once the PDP data session is confirmed active.
    pub cellular_connected: bool,
    pub wifi_ap_active: bool,
    /// Last operator name parsed from the modem; empty until known.
    pub operator: String,
    /// Raw modem-reported CSQ value (0..=31, 0 = unknown). No dBm
    /// conversion anywhere.
    pub signal_strength: i32,
    pub ip_address: String,
    /// Cumulative byte counter; restored from NVS at boot, only ever
    /// incremented.
    pub data_used: u64,
    /// AP client count snapshot from the last supervisor tick.
    pub connected_clients: i32,
    /// Seconds since boot, sampled on the persistence cadence. Advisory.
    pub uptime: u64,
    /// Most recent failure description. Overwritten by each new failure,
    /// cleared only by a new successful bring-up stage.
    pub last_error: String,
    pub led: LedState,
}

pub type SharedStatus = Arc<Mutex<Status>>;

/// Snapshot rendered by `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub cellular_connected: bool,
    pub wifi_ap_active: bool,
    pub operator: String,
    pub signal_strength: i32,
    pub ip_address: String,
    pub data_used: u64,
    pub connected_clients: i32,
    pub uptime: u64,
    pub last_error: String,
    pub free_heap: u32,
}

impl Status {
    pub fn report(&self, free_heap: u32) -> StatusReport {
        StatusReport {
            cellular_connected: self.cellular_connected,
            wifi_ap_active: self.wifi_ap_active,
            operator: self.operator.clone(),
            signal_strength: self.signal_strength,
            ip_address: self.ip_address.clone(),
            data_used: self.data_used,
            connected_clients: self.connected_clients,
            uptime: self.uptime,
            last_error: self.last_error.clone(),
            free_heap,
        }
    }
}
