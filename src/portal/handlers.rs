//! HTTP route handlers.

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    http::{
        server::{EspHttpConnection, EspHttpServer, Request},
        Method,
    },
    io::Write,
};

use super::html;
use crate::modem::{Modem, UartLink};
use crate::status::SharedStatus;

type SharedModem = Arc<Mutex<Modem<UartLink<'static>>>>;

pub fn register_routes(
    server: &mut EspHttpServer<'_>,
    status: SharedStatus,
    modem: SharedModem,
) -> anyhow::Result<()> {
    let status_json = status.clone();
    server.fn_handler("/status", Method::Get, move |req| {
        handle_status(req, &status_json)
    })?;

    server.fn_handler::<anyhow::Error, _>("/restart", Method::Get, |req| {
        let mut resp = req.into_ok_response()?;
        resp.write_all(b"Restarting, the bring-up sequence will re-run from power-off...")?;
        drop(resp);

        // reboot after the response has gone out
        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_secs(2));
            unsafe { esp_idf_svc::sys::esp_restart() }
        });

        Ok(())
    })?;

    let proxy_status = status.clone();
    server.fn_handler("/proxy", Method::Get, move |req| {
        handle_proxy(req, &proxy_status, &modem)
    })?;

    // status page for / and every unmatched path; captive-portal probes
    // land here and render the page
    server.fn_handler("/*", Method::Get, move |req| handle_index(req))?;

    Ok(())
}

fn handle_index(req: Request<&mut EspHttpConnection<'_>>) -> anyhow::Result<()> {
    let mut resp = req.into_ok_response()?;
    resp.write_all(html::INDEX_HTML.as_bytes())?;
    Ok(())
}

fn handle_status(
    req: Request<&mut EspHttpConnection<'_>>,
    status: &SharedStatus,
) -> anyhow::Result<()> {
    let report = {
        let status = status.lock().unwrap();
        status.report(free_heap())
    };
    let json = serde_json::to_string(&report)?;

    let mut resp = req.into_response(200, None, &[("Content-Type", "application/json")])?;
    resp.write_all(json.as_bytes())?;
    Ok(())
}

fn handle_proxy(
    req: Request<&mut EspHttpConnection<'_>>,
    status: &SharedStatus,
    modem: &SharedModem,
) -> anyhow::Result<()> {
    let uri = req.uri().to_string();
    let Some(url) = query_param(&uri, "url") else {
        let mut resp = req.into_response(400, Some("Bad Request"), &[])?;
        resp.write_all(b"missing url parameter, usage: /proxy?url=http://example.com")?;
        return Ok(());
    };

    log::info!("proxy fetch: {}", url);
    let body = {
        let mut modem = modem.lock().unwrap();
        let mut status = status.lock().unwrap();
        modem.http_get(&url, &mut status)
    };

    let mut resp = req.into_response(200, None, &[("Content-Type", "text/plain")])?;
    resp.write_all(body.as_bytes())?;
    Ok(())
}

fn free_heap() -> u32 {
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

/// Minimal query-string extraction; enough for `/proxy?url=...`.
fn query_param(uri: &str, name: &str) -> Option<String> {
    let query = uri.split_once('?')?.1;
    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k == name && !v.is_empty() {
            return Some(percent_decode(v));
        }
    }
    None
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let Ok(v) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(v);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{percent_decode, query_param};

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param("/proxy?url=http%3A%2F%2Fexample.com%2F", "url"),
            Some("http://example.com/".to_string())
        );
        assert_eq!(
            query_param("/proxy?a=1&url=http://x/&b=2", "url"),
            Some("http://x/".to_string())
        );
        assert_eq!(query_param("/proxy", "url"), None);
        assert_eq!(query_param("/proxy?url=", "url"), None);
        assert_eq!(query_param("/proxy?other=1", "url"), None);
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%20b+c"), "a b c");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
