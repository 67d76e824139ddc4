//! Startup configuration: cellular session parameters and AP identity.
//!
//! Compile-time defaults, overridable per key from NVS.

use esp_idf_svc::nvs::EspDefaultNvs;

const DEFAULT_APN: &str = "internet";
const DEFAULT_CONTEXT_ID: u8 = 1;

const DEFAULT_AP_SSID: &str = "CellGate";
const DEFAULT_AP_PASS: &str = "cellgate1234";

/// PDP authentication scheme, carrying the numeric tag used on the wire
/// by `AT+CGAUTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    None,
    Pap,
    Chap,
}

impl AuthScheme {
    pub fn wire_tag(self) -> u8 {
        match self {
            AuthScheme::None => 0,
            AuthScheme::Pap => 1,
            AuthScheme::Chap => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => AuthScheme::Pap,
            2 => AuthScheme::Chap,
            _ => AuthScheme::None,
        }
    }
}

/// Cellular session parameters, immutable for the lifetime of one
/// bring-up attempt.
#[derive(Debug, Clone)]
pub struct CellularConfig {
    pub apn: String,
    pub username: String,
    pub password: String,
    /// PDP context id. Every context-referencing AT command within one
    /// bring-up attempt uses this same id.
    pub context_id: u8,
    pub auth: AuthScheme,
}

impl Default for CellularConfig {
    fn default() -> Self {
        Self {
            apn: DEFAULT_APN.to_string(),
            username: String::new(),
            password: String::new(),
            context_id: DEFAULT_CONTEXT_ID,
            auth: AuthScheme::None,
        }
    }
}

impl CellularConfig {
    pub fn load(nvs: &EspDefaultNvs) -> Self {
        let defaults = Self::default();
        let mut str_buf = [0; 128];

        let apn = nvs
            .get_str("apn", &mut str_buf)
            .map_err(|e| log::error!("Failed to get apn: {:?}", e))
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or(defaults.apn);

        let username = nvs
            .get_str("cell_user", &mut str_buf)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or_default();

        let password = nvs
            .get_str("cell_pass", &mut str_buf)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or_default();

        let auth = nvs
            .get_u8("cell_auth")
            .ok()
            .flatten()
            .map(AuthScheme::from_tag)
            .unwrap_or(defaults.auth);

        Self {
            apn,
            username,
            password,
            context_id: defaults.context_id,
            auth,
        }
    }
}

/// WiFi access point identity.
#[derive(Debug, Clone)]
pub struct ApConfig {
    pub ssid: String,
    pub passphrase: String,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_AP_SSID.to_string(),
            passphrase: DEFAULT_AP_PASS.to_string(),
        }
    }
}

impl ApConfig {
    pub fn load(nvs: &EspDefaultNvs) -> Self {
        let defaults = Self::default();
        let mut str_buf = [0; 128];

        let ssid = nvs
            .get_str("ap_ssid", &mut str_buf)
            .map_err(|e| log::error!("Failed to get ap_ssid: {:?}", e))
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or(defaults.ssid);

        let passphrase = nvs
            .get_str("ap_pass", &mut str_buf)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or(defaults.passphrase);

        Self { ssid, passphrase }
    }
}
