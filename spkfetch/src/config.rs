//! Configuration: endpoints, timeouts and the pattern table.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are read from TOML:
//!
//! ```toml
//! [primary]
//! endpoint = "horizons.jpl.nasa.gov:6775"
//! banner_timeout_secs = 15
//! generate_timeout_secs = 0   # no limit
//!
//! [primary.patterns]
//! span_too_small = '[^\r\n]*span is too short[^\r\n]*\r?\n'
//!
//! [transfer]
//! passive = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::{SessionContext, StepTimeout};
use crate::error::ConfigError;
use crate::service::PatternTable;
use crate::transport::{ConnectionOptions, Endpoint};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The ephemeris service dialogue.
    pub primary: PrimaryConfig,

    /// The file transfer sub-session.
    pub transfer: TransferConfig,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check everything that can be checked without I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.primary.patterns.compile()?;
        Ok(())
    }
}

/// Primary dialogue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrimaryConfig {
    /// Service endpoint.
    pub endpoint: Endpoint,

    /// TCP connect timeout.
    pub connect_timeout_secs: u64,

    /// Timeout for the first prompt. Silence here means the service is
    /// not answering, so this is short.
    pub banner_timeout_secs: u64,

    /// Timeout for ordinary prompts.
    pub step_timeout_secs: u64,

    /// Timeout for file generation; `0` waits without limit.
    pub generate_timeout_secs: u64,

    /// Sent to abandon the dialogue after a failure.
    pub cancel_token: String,

    /// Line terminator for every input.
    pub line_ending: String,

    /// Bytes of received text searched for prompts; `0` searches all.
    pub search_depth: usize,

    /// Maximum scripted replies to a repeating prompt.
    pub max_replies: usize,

    /// Prompts and diagnostics.
    pub patterns: PatternTable,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("horizons.jpl.nasa.gov", 6775),
            connect_timeout_secs: 30,
            banner_timeout_secs: 15,
            step_timeout_secs: 60,
            generate_timeout_secs: 0,
            cancel_token: "q".to_string(),
            line_ending: "\r\n".to_string(),
            search_depth: 65536,
            max_replies: 8,
            patterns: PatternTable::default(),
        }
    }
}

impl PrimaryConfig {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Timeout for the banner step.
    pub fn banner_timeout(&self) -> StepTimeout {
        StepTimeout::from_secs(self.banner_timeout_secs)
    }

    /// Timeout for the generation step.
    pub fn generate_timeout(&self) -> StepTimeout {
        StepTimeout::from_secs(self.generate_timeout_secs)
    }

    /// Options for the connection handle.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            line_ending: self.line_ending.clone(),
            search_depth: self.search_depth,
            telnet: true,
        }
    }

    /// A fresh session context.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(StepTimeout::from_secs(self.step_timeout_secs))
            .with_cancel_token(self.cancel_token.clone())
            .with_max_replies(self.max_replies)
    }
}

/// Transfer sub-session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// FTP endpoint.
    pub endpoint: Endpoint,

    /// Login name. The contact address is the password.
    pub user: String,

    /// Directory holding generated files.
    pub remote_dir: String,

    /// TCP connect timeout, for control and data connections.
    pub connect_timeout_secs: u64,

    /// Timeout for each control reply.
    pub step_timeout_secs: u64,

    /// Timeout for the transfer to complete; `0` waits without limit.
    pub data_timeout_secs: u64,

    /// Start in passive mode instead of active.
    pub passive: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("ssd.jpl.nasa.gov", 21),
            user: "anonymous".to_string(),
            remote_dir: "pub/ssd".to_string(),
            connect_timeout_secs: 30,
            step_timeout_secs: 60,
            data_timeout_secs: 300,
            passive: false,
        }
    }
}

impl TransferConfig {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Timeout for the data transfer.
    pub fn data_timeout(&self) -> StepTimeout {
        StepTimeout::from_secs(self.data_timeout_secs)
    }

    /// Options for the control connection.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            line_ending: "\r\n".to_string(),
            search_depth: 8192,
            telnet: true,
        }
    }

    /// A fresh session context. `QUIT` doubles as the cancellation token.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(StepTimeout::from_secs(self.step_timeout_secs))
            .with_cancel_token("QUIT")
    }
}
