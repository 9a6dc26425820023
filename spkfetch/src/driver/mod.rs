//! Session driver: a finite-state machine over dialogue scripts.
//!
//! A [`Script`] is data: ordered [`Step`]s, each with prioritized
//! [`Branch`]es and an optional timeout. A [`Session`] owns one
//! connection and walks a script step by step. For every step exactly one
//! action fires: the first branch whose pattern matches, or the timeout.
//!
//! Nothing is retried here. A failed step ends the session; whether to run
//! a fresh session is the caller's decision.

mod record;
mod script;
mod session;

pub use record::{StepRecord, Transcript};
pub use script::{Action, Branch, Input, Rejection, Script, Step};
pub use session::{Session, SessionContext};

pub use crate::channel::StepTimeout;
