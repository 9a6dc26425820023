//! Channel layer: received-text accumulation and pattern matching.
//!
//! This module strips telnet negotiation and terminal escapes from the
//! byte stream and tests the accumulated text against prioritized patterns.

mod buffer;
mod patterns;
mod telnet;
mod timeout;

pub use buffer::PatternBuffer;
pub use patterns::{PatternMatch, match_first};
pub use telnet::{Filtered, TelnetFilter};
pub use timeout::StepTimeout;
