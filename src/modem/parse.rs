//! Pure extractors over raw AT response text.
//!
//! Everything here is stateless and panic-free: a missing field is an
//! `Option::None` or a `false`, never an error.

const OK_TERMINATOR: &str = "OK";
const ERROR_MARKER: &str = "ERROR";

/// True once a response buffer is terminal: it ends with the success
/// terminator or contains an error report. Used by the transport to stop
/// accumulating before the timeout.
pub fn response_complete(raw: &str) -> bool {
    raw.trim_end().ends_with(OK_TERMINATOR) || raw.contains(ERROR_MARKER)
}

/// True iff the response carries the success terminator and no error.
/// An error report wins if both are somehow present.
pub fn is_success(raw: &str) -> bool {
    !raw.contains(ERROR_MARKER) && raw.contains(OK_TERMINATOR)
}

/// Content between the first pair of double quotes after `marker`.
pub fn quoted_after<'a>(raw: &'a str, marker: &str) -> Option<&'a str> {
    let rest = &raw[raw.find(marker)? + marker.len()..];
    let rest = &rest[rest.find('"')? + 1..];
    let close = rest.find('"')?;
    Some(&rest[..close])
}

/// The `<rssi>` field of a `+CSQ: <rssi>,<ber>` response, on the raw
/// modem scale.
pub fn signal_quality(raw: &str) -> Option<i32> {
    let rest = raw[raw.find("+CSQ:")? + "+CSQ:".len()..].trim_start();
    let field = rest
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or("");
    field.parse().ok()
}

/// True iff the registration status field (second comma-separated field
/// of the `+CREG:` line) is 1 (registered, home) or 5 (roaming).
pub fn is_registered(raw: &str) -> bool {
    let Some(pos) = raw.find("+CREG:") else {
        return false;
    };
    let line = raw[pos + "+CREG:".len()..].lines().next().unwrap_or("");
    let mut fields = line.split(',');
    let _ = fields.next();
    matches!(fields.next().map(str::trim), Some("1") | Some("5"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        assert!(is_success("\r\nOK\r\n"));
        assert!(is_success("\r\n+CSQ: 23,99\r\n\r\nOK\r\n"));
        assert!(!is_success("\r\nERROR\r\n"));
        // error wins even alongside a success terminator
        assert!(!is_success("\r\n+CME ERROR: 10\r\nOK\r\n"));
        assert!(!is_success(""));
        assert!(!is_success("\r\n+CREG: 0,2\r\n"));
    }

    #[test]
    fn test_response_complete() {
        assert!(response_complete("AT\r\nOK\r\n"));
        assert!(response_complete("\r\nERROR\r\n"));
        assert!(response_complete("+CME ERROR: SIM busy"));
        assert!(!response_complete("\r\n+CSQ: 2"));
        assert!(!response_complete(""));
    }

    #[test]
    fn test_quoted_after_round_trip() {
        assert_eq!(
            quoted_after("\r\n+COPS: 0,0,\"Telia\",7\r\n\r\nOK\r\n", "+COPS:"),
            Some("Telia")
        );
        assert_eq!(
            quoted_after("+CGPADDR: 1,\"10.20.30.40\"\r\nOK", "+CGPADDR:"),
            Some("10.20.30.40")
        );
    }

    #[test]
    fn test_quoted_after_absent() {
        // marker missing
        assert_eq!(quoted_after("\r\nOK\r\n", "+COPS:"), None);
        // no opening quote
        assert_eq!(quoted_after("+COPS: 0,0\r\nOK", "+COPS:"), None);
        // no closing quote
        assert_eq!(quoted_after("+COPS: 0,0,\"Teli", "+COPS:"), None);
    }

    #[test]
    fn test_signal_quality() {
        assert_eq!(signal_quality("\r\n+CSQ: 23,99\r\n\r\nOK\r\n"), Some(23));
        assert_eq!(signal_quality("+CSQ: 0,0"), Some(0));
        assert_eq!(signal_quality("\r\nOK\r\n"), None);
        assert_eq!(signal_quality("+CSQ: ,99"), None);
        assert_eq!(signal_quality("+CSQ: abc,99"), None);
    }

    #[test]
    fn test_is_registered() {
        assert!(is_registered("\r\n+CREG: 0,1\r\n\r\nOK\r\n"));
        assert!(is_registered("\r\n+CREG: 0,5\r\n\r\nOK\r\n"));
        assert!(is_registered("+CREG: 2,5"));

        assert!(!is_registered("\r\n+CREG: 0,2\r\n\r\nOK\r\n"));
        assert!(!is_registered("+CREG: 0,0"));
        assert!(!is_registered("+CREG: 0,3"));
        assert!(!is_registered("+CREG: 0,4"));
        // status 1 in the wrong field does not count
        assert!(!is_registered("+CREG: 1"));
        assert!(!is_registered("+CREG: 1,"));
        assert!(!is_registered("garbage"));
        assert!(!is_registered(""));
    }
}
