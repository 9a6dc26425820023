//! FTP control-connection replies.
//!
//! Reply patterns match a complete final reply line (`NNN text\r\n`).
//! Continuation lines of a multi-line reply (`NNN-text`) never match, so
//! a step only fires once the whole reply has arrived.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::error::TransferError;

macro_rules! reply {
    ($name:ident, $codes:literal) => {
        pub(crate) static $name: Lazy<Regex> = Lazy::new(|| {
            Regex::new(concat!(r"(?m)^(?:", $codes, r") [^\r\n]*\r?\n"))
                .expect("valid FTP reply pattern")
        });
    };
}

reply!(SERVICE_READY, "220");
reply!(SERVICE_UNAVAILABLE, "421");
reply!(NEED_PASSWORD, "331");
reply!(LOGGED_IN, "230");
reply!(LOGIN_COMPLETE, "230|200|202");
reply!(COMMAND_OK, "200");
reply!(DIRECTORY_OK, "250|200");
reply!(ENTERING_PASSIVE, "227");
reply!(DATA_OPENING, "150|125");
reply!(DATA_UNAVAILABLE, "425");
reply!(FILE_UNAVAILABLE, "550");
reply!(TRANSFER_COMPLETE, "226|250");
reply!(CLOSING, "221");
reply!(NEGATIVE, r"[45]\d\d");

static PASSIVE_ADDRESS: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})")
        .expect("valid passive address pattern")
});

/// Argument of a `PORT` command for `ip:port`.
pub(crate) fn port_argument(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    let [p1, p2] = port.to_be_bytes();
    format!("{h1},{h2},{h3},{h4},{p1},{p2}")
}

/// Data port announced by a `227` reply.
///
/// The host part is validated but not returned: it is frequently a
/// private address behind a translating gateway, so the caller connects
/// to the control connection's peer instead.
pub(crate) fn passive_port(reply: &str) -> Result<u16, TransferError> {
    let malformed = || TransferError::MalformedPassiveReply(reply.trim().to_string());
    let caps = PASSIVE_ADDRESS.captures(reply).ok_or_else(malformed)?;

    let mut fields = [0u8; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = caps[i + 1].parse().map_err(|_| malformed())?;
    }
    Ok(u16::from_be_bytes([fields[4], fields[5]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_waits_for_final_line() {
        assert!(!SERVICE_READY.is_match(b"220-Welcome to the archive\r\n"));
        assert!(!SERVICE_READY.is_match(b"220 Ready"));
        assert!(SERVICE_READY.is_match(b"220-Welcome\r\n220-Be nice\r\n220 Ready\r\n"));
    }

    #[test]
    fn test_negative_reply_matches_any_failure() {
        assert!(NEGATIVE.is_match(b"530 Login incorrect.\r\n"));
        assert!(NEGATIVE.is_match(b"451 Local error\n"));
        assert!(!NEGATIVE.is_match(b"250 OK\r\n"));
    }

    #[test]
    fn test_port_argument() {
        assert_eq!(
            port_argument(Ipv4Addr::new(192, 168, 1, 20), 50021),
            "192,168,1,20,195,101"
        );
    }

    #[test]
    fn test_passive_port() {
        let reply = "227 Entering Passive Mode (137,78,12,4,195,101).\r\n";
        assert_eq!(passive_port(reply).unwrap(), 50021);
    }

    #[test]
    fn test_passive_port_malformed() {
        assert!(matches!(
            passive_port("227 Entering Passive Mode\r\n"),
            Err(TransferError::MalformedPassiveReply(_))
        ));
        assert!(matches!(
            passive_port("227 Entering Passive Mode (10,0,0,1,300,1)\r\n"),
            Err(TransferError::MalformedPassiveReply(_))
        ));
    }
}
