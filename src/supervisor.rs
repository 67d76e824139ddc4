//! Periodic housekeeping: client count snapshot, signal refresh, LED
//! derivation, and the usage persistence cadence.

use std::time::Duration;

use crate::modem::{AtLink, Modem, Phase};
use crate::status::{LedState, Status};

pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Persist the usage counter every sixth tick (~30 s).
const PERSIST_EVERY: u64 = 6;

/// Picks the LED state from the session phase and the client snapshot.
/// Before the session is up the LED mirrors the bring-up phase; once
/// active it tracks whether anyone is actually connected to the AP.
pub fn derive_led_state(phase: Phase, clients: i32) -> LedState {
    match phase {
        Phase::PoweredOff | Phase::PoweringOn => LedState::Startup,
        Phase::Error => LedState::Error,
        Phase::Active => {
            if clients > 0 {
                LedState::DataActive
            } else {
                LedState::Connected
            }
        }
        _ => LedState::Connecting,
    }
}

#[derive(Default)]
pub struct Supervisor {
    ticks: u64,
}

impl Supervisor {
    /// One 5-second tick. Returns true when the caller should persist
    /// the usage counter and refresh the uptime sample.
    pub fn tick<L: AtLink>(
        &mut self,
        modem: &mut Modem<L>,
        status: &mut Status,
        clients: i32,
    ) -> bool {
        self.ticks += 1;

        status.connected_clients = clients;
        if status.cellular_connected {
            modem.refresh_signal(status);
        }
        status.led = derive_led_state(modem.phase(), clients);

        self.ticks % PERSIST_EVERY == 0
    }
}
