//! Minimal telnet option handling.
//!
//! Services reached through a telnet port may open with option
//! negotiation. We never enable any option: every `DO` is answered with
//! `WONT` and every `WILL` with `DONT`. Command sequences are removed from
//! the data stream before pattern matching.

use memchr::memchr;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Output of filtering one chunk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Application data with telnet commands removed.
    pub data: Vec<u8>,

    /// Negotiation replies to write back to the peer.
    pub replies: Vec<u8>,
}

/// Streaming telnet command filter. State carries across chunks.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    /// Create a new filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter a chunk of received bytes.
    pub fn filter(&mut self, mut input: &[u8]) -> Filtered {
        let mut out = Filtered {
            data: Vec::with_capacity(input.len()),
            replies: Vec::new(),
        };

        while !input.is_empty() {
            if self.state == State::Data {
                match memchr(IAC, input) {
                    Some(pos) => {
                        out.data.extend_from_slice(&input[..pos]);
                        self.state = State::Iac;
                        input = &input[pos + 1..];
                    }
                    None => {
                        out.data.extend_from_slice(input);
                        break;
                    }
                }
                continue;
            }

            let byte = input[0];
            input = &input[1..];
            self.state = match (self.state, byte) {
                (State::Iac, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Iac, DO | DONT | WILL | WONT) => State::Option(byte),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Option(command), option) => {
                    match command {
                        DO => out.replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => out.replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
                (State::Data, _) => unreachable!("data state handled above"),
            };
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passes_through() {
        let mut filter = TelnetFilter::new();
        let out = filter.filter(b"Horizons> ");
        assert_eq!(out.data, b"Horizons> ");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_refuses_options() {
        let mut filter = TelnetFilter::new();
        let out = filter.filter(&[IAC, DO, 1, b'h', IAC, WILL, 3, b'i']);
        assert_eq!(out.data, b"hi");
        assert_eq!(out.replies, vec![IAC, WONT, 1, IAC, DONT, 3]);
    }

    #[test]
    fn test_command_split_across_chunks() {
        let mut filter = TelnetFilter::new();
        let first = filter.filter(&[b'a', IAC]);
        let second = filter.filter(&[DO, 24, b'b']);
        assert_eq!(first.data, b"a");
        assert_eq!(second.data, b"b");
        assert_eq!(second.replies, vec![IAC, WONT, 24]);
    }

    #[test]
    fn test_subnegotiation_is_dropped() {
        let mut filter = TelnetFilter::new();
        let out = filter.filter(&[IAC, SB, 24, 1, IAC, SE, b'o', b'k']);
        assert_eq!(out.data, b"ok");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut filter = TelnetFilter::new();
        let out = filter.filter(&[b'x', IAC, IAC, b'y']);
        assert_eq!(out.data, vec![b'x', IAC, b'y']);
    }
}
