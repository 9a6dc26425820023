//! Error types for spkfetch.

use std::io;

use thiserror::Error;

use crate::channel::StepTimeout;

/// Main error type for spkfetch operations.
///
/// Every variant is terminal for the whole run; the binary maps all of
/// them to exit status 1.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input was malformed or missing. No I/O was performed.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration could not be loaded or compiled.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The endpoint could not be resolved or reached.
    #[error("Connection failed to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// No branch of a step matched within its time budget.
    #[error("No response at step {index} ({step}) within {timeout}")]
    ProtocolTimeout {
        step: String,
        index: usize,
        timeout: StepTimeout,
    },

    /// The remote peer reported a recognized error condition.
    /// `diagnostic` is the peer's text, verbatim.
    #[error("Remote rejected request at step {index} ({step}): {reason}: {diagnostic}")]
    RemoteRejected {
        step: String,
        index: usize,
        reason: String,
        diagnostic: String,
    },

    /// The peer closed the connection before a step matched.
    #[error("Connection closed by remote at step {index} ({step})")]
    Disconnected { step: String, index: usize },

    /// Artifact retrieval failed.
    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// I/O error outside of pattern matching (writes, local files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors, produced by the connection handle while waiting
/// for a pattern. The driver turns these into step-aware [`Error`]s.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No pattern matched before the deadline.
    #[error("Pattern not found within {0}")]
    TimedOut(StepTimeout),

    /// Peer closed the stream.
    #[error("Channel closed")]
    Closed,

    /// Read or write failure on the stream.
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Caller input errors, detected before any connection attempt.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// A required parameter is empty.
    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    /// Contact token lacks the `@` marker.
    #[error("contact '{contact}' is not an e-mail address (expected user@domain)")]
    MalformedContact { contact: String },

    /// Wrong set of arguments on the command line.
    #[error("{message}")]
    Usage { message: String },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// TOML did not parse into the configuration schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A pattern in the pattern table is not a valid regex.
    #[error("invalid pattern '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    /// A pattern lacks a named group the dialogue depends on.
    #[error("pattern '{key}' must define the named group '{group}'")]
    MissingCapture { key: String, group: &'static str },

    /// Endpoint string is not `host:port`.
    #[error("invalid endpoint '{0}' (expected host:port)")]
    InvalidEndpoint(String),
}

/// Transfer sub-session errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The artifact does not exist on the remote store.
    #[error("remote file '{file}' not found: {reply}")]
    NotFound { file: String, reply: String },

    /// The remote refused the login.
    #[error("login refused: {reply}")]
    LoginRefused { reply: String },

    /// The remote directory could not be entered.
    #[error("cannot change to remote directory '{dir}': {reply}")]
    Directory { dir: String, reply: String },

    /// The data connection could not be established, even in passive mode.
    #[error("data connection failed: {reply}")]
    DataConnection { reply: String },

    /// A passive-mode reply could not be parsed.
    #[error("malformed passive reply: {0}")]
    MalformedPassiveReply(String),

    /// Any other non-retryable remote reply.
    #[error("remote error: {reply}")]
    Remote { reply: String },
}

/// Result type alias using spkfetch's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_timeout_message_names_step() {
        let err = Error::ProtocolTimeout {
            step: "start".into(),
            index: 5,
            timeout: StepTimeout::After(Duration::from_secs(60)),
        };
        assert_eq!(err.to_string(), "No response at step 5 (start) within 60s");
    }

    #[test]
    fn test_rejection_carries_diagnostic() {
        let err = Error::RemoteRejected {
            step: "span-check".into(),
            index: 7,
            reason: "time span below minimum".into(),
            diagnostic: "Cannot continue, time-span too small".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote rejected request at step 7 (span-check): \
             time span below minimum: Cannot continue, time-span too small"
        );
    }
}
