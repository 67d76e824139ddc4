//! Captive-portal DNS: answers every A query with the AP's own address
//! so any client lookup lands on the status page.

use std::net::{Ipv4Addr, UdpSocket};

use anyhow::Result;

pub struct CaptiveDns {
    socket: UdpSocket,
    ip: Ipv4Addr,
}

impl CaptiveDns {
    pub fn new(ip: Ipv4Addr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 53))?;
        socket.set_nonblocking(true)?;
        log::info!("captive DNS up, answering A lookups with {}", ip);
        Ok(Self { socket, ip })
    }

    /// Non-blocking; call on every pass of the main loop.
    pub fn service(&mut self) {
        let mut buf = [0u8; 512];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, peer)) => {
                    if let Some(reply) = build_response(&buf[..len], self.ip) {
                        let _ = self.socket.send_to(&reply, peer);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("dns recv failed: {}", e);
                    break;
                }
            }
        }
    }
}

const QTYPE_A: u16 = 1;
const QTYPE_ANY: u16 = 255;

/// Builds a one-answer response echoing the question section verbatim,
/// with a compression pointer back to the query name. Returns `None` for
/// packets too short to be a query, for responses, and for question
/// types an A record cannot answer.
fn build_response(query: &[u8], ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < 12 || query[2] & 0x80 != 0 {
        return None;
    }
    if !matches!(question_type(query)?, QTYPE_A | QTYPE_ANY) {
        return None;
    }

    let mut out = Vec::with_capacity(query.len() + 16);
    out.extend_from_slice(&query[..2]); // transaction id
    out.extend_from_slice(&[0x81, 0x80]); // standard response, no error
    out.extend_from_slice(&query[4..6]); // question count
    out.extend_from_slice(&[0, 1, 0, 0, 0, 0]); // one answer, no auth/extra
    out.extend_from_slice(&query[12..]); // question section
    out.extend_from_slice(&[0xc0, 0x0c]); // name: pointer to the question
    out.extend_from_slice(&[0, 1, 0, 1]); // type A, class IN
    out.extend_from_slice(&[0, 0, 0, 60]); // TTL 60 s
    out.extend_from_slice(&[0, 4]);
    out.extend_from_slice(&ip.octets());
    Some(out)
}

/// QTYPE of the first question, found by walking the name labels.
/// Compressed names do not occur in queries and are rejected.
fn question_type(query: &[u8]) -> Option<u16> {
    let mut i = 12;
    loop {
        let len = *query.get(i)? as usize;
        if len == 0 {
            break;
        }
        if len >= 0xc0 {
            return None;
        }
        i += 1 + len;
    }
    Some(u16::from_be_bytes([*query.get(i + 1)?, *query.get(i + 2)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_of_type(qtype: u16) -> Vec<u8> {
        let mut q = vec![
            0x12, 0x34, // id
            0x01, 0x00, // standard query, recursion desired
            0x00, 0x01, // one question
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        // example.com IN
        q.extend_from_slice(b"\x07example\x03com\x00");
        q.extend_from_slice(&qtype.to_be_bytes());
        q.extend_from_slice(&[0x00, 0x01]);
        q
    }

    fn a_query() -> Vec<u8> {
        query_of_type(QTYPE_A)
    }

    #[test]
    fn test_answers_with_given_ip() {
        let ip = Ipv4Addr::new(192, 168, 4, 1);
        let reply = build_response(&a_query(), ip).unwrap();

        assert_eq!(&reply[..2], &[0x12, 0x34]);
        assert_eq!(reply[2] & 0x80, 0x80); // response bit set
        assert_eq!(&reply[6..8], &[0x00, 0x01]); // one answer
        assert_eq!(&reply[reply.len() - 4..], &ip.octets());
    }

    #[test]
    fn test_ignores_short_packets() {
        assert!(build_response(&[0x12, 0x34, 0x01], Ipv4Addr::LOCALHOST).is_none());
        assert!(build_response(&[], Ipv4Addr::LOCALHOST).is_none());
    }

    #[test]
    fn test_ignores_responses() {
        let mut q = a_query();
        q[2] |= 0x80;
        assert!(build_response(&q, Ipv4Addr::LOCALHOST).is_none());
    }

    #[test]
    fn test_only_a_questions_get_an_a_answer() {
        let ip = Ipv4Addr::new(192, 168, 4, 1);
        // AAAA (28) and TXT (16) must not receive a mismatched A record
        assert!(build_response(&query_of_type(28), ip).is_none());
        assert!(build_response(&query_of_type(16), ip).is_none());
        // ANY is fair game for an A answer
        assert!(build_response(&query_of_type(QTYPE_ANY), ip).is_some());
    }
}
