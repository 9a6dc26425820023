//! # spkfetch
//!
//! Scripted dialogue driver that requests a small-body SPK ephemeris file
//! from the JPL Horizons telnet service and downloads it over FTP.
//!
//! The core is a small expect-style engine:
//!
//! - [`transport::Connection`] owns one byte stream and waits for the first
//!   of several prioritized patterns, with a per-step timeout.
//! - [`driver::Session`] walks a [`driver::Script`] of expectation steps,
//!   firing exactly one action per step and turning every divergence into
//!   a distinct [`Error`].
//! - [`service`] holds the Horizons dialogue and [`transfer`] the FTP
//!   sub-session, both written as scripts for the same driver.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spkfetch::{Config, Format, RawRequest, pipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let request = RawRequest {
//!         format: Some(Format::Binary),
//!         label: "2000433".into(),
//!         start: "2020-Jan-01".into(),
//!         stop: "2030-Jan-01".into(),
//!         contact: "user@example.com".into(),
//!         ..Default::default()
//!     };
//!
//!     let outcome = pipeline::execute(request, &Config::default()).await;
//!     println!("{outcome}");
//!     std::process::exit(outcome.exit_code().into());
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod transfer;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use driver::{Action, Input, Script, Session, SessionContext, Step, StepTimeout};
pub use error::{Error, Result};
pub use outcome::Outcome;
pub use request::{Format, RawRequest, Request};
pub use service::Artifact;
pub use transport::{Connection, Endpoint};
