//! The terminal result of one run.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// What the run produced. Built exactly once, from the pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the artifact was retrieved and saved.
    pub success: bool,

    /// Local path of the saved artifact.
    pub path: Option<PathBuf>,

    /// Human-readable reason: the saved path, or what went wrong.
    pub reason: String,
}

impl Outcome {
    /// Build the outcome of a finished run.
    pub fn from_result(result: Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                reason: format!("saved {}", path.display()),
                path: Some(path),
            },
            Err(e) => Self {
                success: false,
                path: None,
                reason: e.to_string(),
            },
        }
    }

    /// Process exit status: `0` on success, `1` for every failure.
    pub fn exit_code(&self) -> u8 {
        if self.success { 0 } else { 1 }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.success) {
            (Some(path), true) => write!(f, "{}", path.display()),
            _ => f.write_str(&self.reason),
        }
    }
}
