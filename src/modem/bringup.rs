//! Ordered AT bring-up to an active PDP data session, plus the
//! in-session operations (signal refresh, HTTP-over-AT fetch) that reuse
//! the same link.

use std::time::Duration;

use anyhow::{anyhow, Result};

use super::command::AtCommand;
use super::parse;
use super::transport::AtLink;
use crate::config::{AuthScheme, CellularConfig};
use crate::status::Status;

/// Bring-up phases. `Error` is absorbing: the machine takes no further
/// action on its own and recovery is an external restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PoweredOff,
    PoweringOn,
    Probing,
    ConfiguringNetwork,
    WaitingForRegistration,
    ConfiguringApn,
    ActivatingContext,
    OpeningDataSession,
    Active,
    Error,
}

/// Timing knobs, constructor-injectable so tests run without real
/// delays.
#[derive(Debug, Clone)]
pub struct BringupPolicy {
    pub command_timeout: Duration,
    /// Context activation is slow on live networks, so it gets its own
    /// much longer ceiling.
    pub activation_timeout: Duration,
    pub registration_poll_interval: Duration,
    pub registration_max_attempts: u32,
    pub probe_attempts: u32,
    pub power_assert_hold: Duration,
    pub power_cycle_hold: Duration,
    pub power_boot_wait: Duration,
}

impl Default for BringupPolicy {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            activation_timeout: Duration::from_secs(30),
            registration_poll_interval: Duration::from_secs(2),
            registration_max_attempts: 60,
            probe_attempts: 10,
            power_assert_hold: Duration::from_millis(500),
            power_cycle_hold: Duration::from_millis(1200),
            power_boot_wait: Duration::from_secs(3),
        }
    }
}

pub struct Modem<L> {
    link: L,
    config: CellularConfig,
    policy: BringupPolicy,
    phase: Phase,
}

impl<L: AtLink> Modem<L> {
    pub fn new(link: L, config: CellularConfig) -> Self {
        Self::with_policy(link, config, BringupPolicy::default())
    }

    pub fn with_policy(link: L, config: CellularConfig, policy: BringupPolicy) -> Self {
        Self {
            link,
            config,
            policy,
            phase: Phase::PoweredOff,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drives the power-key line through the clean power transition the
    /// module requires after boot: assert, hold, deassert, hold,
    /// reassert, then wait for the modem firmware to come up.
    pub fn power_on(&mut self, mut set_power: impl FnMut(bool)) {
        self.phase = Phase::PoweringOn;
        set_power(true);
        std::thread::sleep(self.policy.power_assert_hold);
        set_power(false);
        std::thread::sleep(self.policy.power_cycle_hold);
        set_power(true);
        std::thread::sleep(self.policy.power_boot_wait);
    }

    /// Runs the full bring-up sequence. On success the data session is
    /// active and `status.cellular_connected` is set.
    ///
    /// On protocol failure the machine parks in [`Phase::Error`] with
    /// `status.last_error` describing the failed stage; every other
    /// status field keeps its last known-good value.
    pub fn connect(&mut self, status: &mut Status) -> Result<()> {
        self.phase = Phase::Probing;
        self.probe(status)?;

        self.phase = Phase::ConfiguringNetwork;
        self.advisory(AtCommand::new("ATE0"));
        self.advisory(AtCommand::new("AT+CNMP").int(2));

        let resp = self.exchange(&AtCommand::new("AT+CPIN?"));
        if !resp.contains("READY") {
            return Err(self.fail(status, "SIM not ready"));
        }
        status.last_error.clear();

        self.advisory(AtCommand::new("AT+COPS").int(3).int(0));

        self.phase = Phase::WaitingForRegistration;
        self.wait_for_registration(status)?;

        // Best effort; a miss here just leaves the prior values.
        if let Some(op) = parse::quoted_after(&self.exchange(&AtCommand::new("AT+COPS?")), "+COPS:")
        {
            status.operator = op.to_string();
        }
        if let Some(q) = parse::signal_quality(&self.exchange(&AtCommand::new("AT+CSQ"))) {
            status.signal_strength = q;
        }

        self.phase = Phase::ConfiguringApn;
        let define = AtCommand::new("AT+CGDCONT")
            .int(self.config.context_id)
            .quoted("IP")
            .quoted(self.config.apn.clone());
        if !parse::is_success(&self.exchange(&define)) {
            return Err(self.fail(status, "APN configuration failed"));
        }
        status.last_error.clear();

        let mut auth = AtCommand::new("AT+CGAUTH")
            .int(self.config.context_id)
            .int(self.config.auth.wire_tag());
        if self.config.auth != AuthScheme::None {
            auth = auth
                .quoted(self.config.username.clone())
                .quoted(self.config.password.clone());
        }
        self.advisory(auth);

        self.phase = Phase::ActivatingContext;
        let activate = AtCommand::new("AT+CGACT").int(1).int(self.config.context_id);
        let resp = self
            .link
            .send(&activate.render(), self.policy.activation_timeout);
        if !parse::is_success(&resp) {
            return Err(self.fail(status, "context activation failed"));
        }
        status.last_error.clear();

        let resp = self.exchange(&AtCommand::new("AT+CGPADDR").int(self.config.context_id));
        if let Some(ip) = parse::quoted_after(&resp, "+CGPADDR:") {
            status.ip_address = ip.to_string();
        }

        self.phase = Phase::OpeningDataSession;
        let resp = self.exchange(&AtCommand::new("AT+NETOPEN"));
        // Some firmwares report "Network opened" without a final OK;
        // accept both wordings.
        if !parse::is_success(&resp) && !resp.contains("Network opened") {
            return Err(self.fail(status, "session start failed"));
        }
        status.last_error.clear();

        self.phase = Phase::Active;
        status.cellular_connected = true;
        log::info!(
            "cellular data session active (operator: {:?}, ip: {:?})",
            status.operator,
            status.ip_address
        );
        Ok(())
    }

    /// Short-timeout CSQ poll used by the supervisor while the session
    /// is active. A parse miss leaves the previous reading.
    pub fn refresh_signal(&mut self, status: &mut Status) {
        if let Some(q) = parse::signal_quality(&self.exchange(&AtCommand::new("AT+CSQ"))) {
            status.signal_strength = q;
        }
    }

    /// Simplified HTTP fetch through the modem's embedded stack: init
    /// session, set URL, trigger the fetch, read the body, tear down.
    /// Returns the raw read text; its byte length is added to the usage
    /// counter.
    pub fn http_get(&mut self, url: &str, status: &mut Status) -> String {
        self.advisory(AtCommand::new("AT+HTTPINIT"));
        self.advisory(AtCommand::new("AT+HTTPPARA").quoted("URL").quoted(url));

        let action = AtCommand::new("AT+HTTPACTION").int(0);
        let _ = self
            .link
            .send(&action.render(), self.policy.activation_timeout);

        let read = AtCommand::new("AT+HTTPREAD").int(0).int(4096);
        let body = self
            .link
            .send(&read.render(), self.policy.activation_timeout);

        self.advisory(AtCommand::new("AT+HTTPTERM"));

        status.data_used += body.len() as u64;
        body
    }

    fn probe(&mut self, status: &mut Status) -> Result<()> {
        for _ in 0..self.policy.probe_attempts {
            if parse::is_success(&self.exchange(&AtCommand::new("AT"))) {
                status.last_error.clear();
                return Ok(());
            }
        }
        Err(self.fail(status, "modem not responding"))
    }

    fn wait_for_registration(&mut self, status: &mut Status) -> Result<()> {
        for attempt in 0..self.policy.registration_max_attempts {
            if attempt > 0 {
                std::thread::sleep(self.policy.registration_poll_interval);
            }
            if parse::is_registered(&self.exchange(&AtCommand::new("AT+CREG?"))) {
                status.last_error.clear();
                return Ok(());
            }
        }
        Err(self.fail(status, "registration failed"))
    }

    fn exchange(&mut self, cmd: &AtCommand) -> String {
        self.link.send(&cmd.render(), self.policy.command_timeout)
    }

    /// Sends a command whose outcome does not gate bring-up. A rejection
    /// is logged and otherwise ignored.
    fn advisory(&mut self, cmd: AtCommand) {
        let text = cmd.render();
        let resp = self.link.send(&text, self.policy.command_timeout);
        if !parse::is_success(&resp) {
            log::warn!("advisory command not accepted: {}", text);
        }
    }

    fn fail(&mut self, status: &mut Status, msg: &str) -> anyhow::Error {
        self.phase = Phase::Error;
        status.last_error = msg.to_string();
        log::error!("modem bring-up failed: {}", msg);
        anyhow!("{}", msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::testutil::{sent_count, ScriptLink};

    fn fast_policy() -> BringupPolicy {
        BringupPolicy {
            command_timeout: Duration::from_millis(1),
            activation_timeout: Duration::from_millis(1),
            registration_poll_interval: Duration::from_millis(1),
            registration_max_attempts: 60,
            probe_attempts: 2,
            power_assert_hold: Duration::ZERO,
            power_cycle_hold: Duration::ZERO,
            power_boot_wait: Duration::ZERO,
        }
    }

    fn happy_link() -> ScriptLink {
        ScriptLink::new()
            .rule("AT+CPIN?", &["\r\n+CPIN: READY\r\n\r\nOK\r\n"])
            .rule("AT+CREG?", &["\r\n+CREG: 0,1\r\n\r\nOK\r\n"])
            .rule("AT+COPS?", &["\r\n+COPS: 0,0,\"TestNet\",7\r\n\r\nOK\r\n"])
            .rule("AT+CSQ", &["\r\n+CSQ: 23,99\r\n\r\nOK\r\n"])
            .rule("AT+CGPADDR", &["\r\n+CGPADDR: 1,\"10.20.30.40\"\r\n\r\nOK\r\n"])
    }

    fn modem(link: ScriptLink) -> Modem<ScriptLink> {
        Modem::with_policy(link, CellularConfig::default(), fast_policy())
    }

    #[test]
    fn test_connect_happy_path() {
        let link = happy_link();
        let sent = link.sent.clone();
        let mut m = modem(link);
        let mut status = Status::default();

        m.connect(&mut status).unwrap();

        assert_eq!(m.phase(), Phase::Active);
        assert!(status.cellular_connected);
        assert_eq!(status.operator, "TestNet");
        assert_eq!(status.signal_strength, 23);
        assert_eq!(status.ip_address, "10.20.30.40");
        assert!(status.last_error.is_empty());

        // the context id threads through every PDP-referencing command
        let sent = sent.borrow();
        assert!(sent.iter().any(|c| c == "AT+CGDCONT=1,\"IP\",\"internet\""));
        assert!(sent.iter().any(|c| c == "AT+CGACT=1,1"));
        assert!(sent.iter().any(|c| c == "AT+CGPADDR=1"));
    }

    #[test]
    fn test_probe_failure() {
        let link = ScriptLink::new().rule("AT", &[""]);
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("not responding"));
        assert_eq!(m.phase(), Phase::Error);
        assert_eq!(status.last_error, "modem not responding");
    }

    #[test]
    fn test_sim_not_ready_halts() {
        let link = happy_link().rule_override("AT+CPIN?", &["\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n"]);
        let sent = link.sent.clone();
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("SIM not ready"));
        assert_eq!(m.phase(), Phase::Error);
        assert!(!status.cellular_connected);
        assert_eq!(status.last_error, "SIM not ready");
        // bring-up halted before ever asking for registration
        assert_eq!(sent_count(&sent, "AT+CREG?"), 0);
    }

    #[test]
    fn test_registration_succeeds_on_third_poll() {
        let link = happy_link().rule_override(
            "AT+CREG?",
            &[
                "\r\n+CREG: 0,2\r\n\r\nOK\r\n",
                "\r\n+CREG: 0,2\r\n\r\nOK\r\n",
                "\r\n+CREG: 0,1\r\n\r\nOK\r\n",
            ],
        );
        let sent = link.sent.clone();
        let mut m = modem(link);
        let mut status = Status::default();

        m.connect(&mut status).unwrap();
        assert_eq!(sent_count(&sent, "AT+CREG?"), 3);
        assert!(status.cellular_connected);
    }

    #[test]
    fn test_registration_exhaustion() {
        let link = happy_link().rule_override("AT+CREG?", &["\r\n+CREG: 0,2\r\n\r\nOK\r\n"]);
        let sent = link.sent.clone();
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("registration failed"));
        assert_eq!(sent_count(&sent, "AT+CREG?"), 60);
        assert_eq!(status.last_error, "registration failed");
        assert_eq!(m.phase(), Phase::Error);
    }

    #[test]
    fn test_apn_rejection() {
        let link = happy_link().rule("AT+CGDCONT", &["\r\nERROR\r\n"]);
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("APN configuration failed"));
        // telemetry gathered before the failure survives it
        assert_eq!(status.operator, "TestNet");
        assert_eq!(status.signal_strength, 23);
    }

    #[test]
    fn test_activation_timeout_leaves_ip_untouched() {
        // an empty response is what the transport returns on timeout
        let link = happy_link().rule("AT+CGACT", &[""]);
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("activation failed"));
        assert_eq!(m.phase(), Phase::Error);
        assert!(status.ip_address.is_empty());
        assert!(!status.cellular_connected);
    }

    #[test]
    fn test_netopen_alternate_phrase() {
        let link = happy_link().rule("AT+NETOPEN", &["\r\nNetwork opened\r\n"]);
        let mut m = modem(link);
        let mut status = Status::default();

        m.connect(&mut status).unwrap();
        assert_eq!(m.phase(), Phase::Active);
        assert!(status.cellular_connected);
    }

    #[test]
    fn test_netopen_rejection() {
        let link = happy_link().rule("AT+NETOPEN", &["\r\nERROR\r\n"]);
        let mut m = modem(link);
        let mut status = Status::default();

        let err = m.connect(&mut status).unwrap_err();
        assert!(err.to_string().contains("session start failed"));
        assert!(!status.cellular_connected);
        // the address parsed just before the failure is kept
        assert_eq!(status.ip_address, "10.20.30.40");
    }

    #[test]
    fn test_new_success_clears_prior_error() {
        let link = happy_link().rule_override("AT+CPIN?", &["\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n"]);
        let mut m = modem(link);
        let mut status = Status::default();
        assert!(m.connect(&mut status).is_err());
        assert_eq!(status.last_error, "SIM not ready");

        // after an external restart the machine starts fresh; a passing
        // stage wipes the stale diagnostic
        let mut m = modem(happy_link());
        m.connect(&mut status).unwrap();
        assert!(status.last_error.is_empty());
    }

    #[test]
    fn test_http_get_counts_usage() {
        let body = "\r\n+HTTPREAD: 12\r\nhello world!\r\nOK\r\n";
        let link = happy_link().rule("AT+HTTPREAD", &[body]);
        let sent = link.sent.clone();
        let mut m = modem(link);
        let mut status = Status::default();
        // counter restored from storage before any new traffic
        status.data_used = 12345;

        let out = m.http_get("http://example.com/", &mut status);
        assert_eq!(out, body);
        assert_eq!(status.data_used, 12345 + body.len() as u64);

        let sent = sent.borrow();
        assert!(sent
            .iter()
            .any(|c| c == "AT+HTTPPARA=\"URL\",\"http://example.com/\""));
        assert!(sent.iter().any(|c| c == "AT+HTTPTERM"));
    }
}
