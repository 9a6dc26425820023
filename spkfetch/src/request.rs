//! Validated invocation parameters.

use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ValidationError;

/// Requested artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Ready-to-use binary SPK file.
    Binary,

    /// Text transfer format, converted locally by the user.
    Transfer,
}

impl Format {
    /// Local file suffix for this format.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Binary => "bsp",
            Self::Transfer => "xsp",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Transfer => f.write_str("transfer"),
        }
    }
}

/// Parameters as received from the caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub format: Option<Format>,
    pub label: String,
    pub start: String,
    pub stop: String,
    pub elements: String,
    pub contact: String,
    pub output: Option<PathBuf>,
}

impl RawRequest {
    /// Check every parameter. Performs no I/O.
    pub fn validate(self) -> Result<Request, ValidationError> {
        let format = self.format.ok_or_else(|| ValidationError::Usage {
            message: "exactly one of -b (binary) or -t (transfer) is required".to_string(),
        })?;

        let label = non_empty("label", self.label)?;
        let start = non_empty("start", self.start)?;
        let stop = non_empty("stop", self.stop)?;
        let contact = non_empty("contact", self.contact)?;

        match contact.split_once('@') {
            Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {}
            _ => return Err(ValidationError::MalformedContact { contact }),
        }

        let elements: Vec<String> = self
            .elements
            .split([';', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if let Some(output) = &self.output {
            if output.as_os_str().is_empty() {
                return Err(ValidationError::Empty { name: "output" });
            }
        }

        Ok(Request {
            format,
            label,
            start,
            stop,
            elements,
            contact: SecretString::from(contact),
            output: self.output,
        })
    }
}

fn non_empty(name: &'static str, value: String) -> Result<String, ValidationError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        Err(ValidationError::Empty { name })
    } else {
        Ok(value)
    }
}

/// A validated request for one artifact.
#[derive(Debug)]
pub struct Request {
    /// Requested format.
    pub format: Format,

    /// Catalogue designation, or the object name for user elements.
    pub label: String,

    /// Start of the covered time span, in the remote's date syntax.
    pub start: String,

    /// End of the covered time span.
    pub stop: String,

    /// User-supplied element lines; empty for a catalogue lookup.
    pub elements: Vec<String>,

    /// Contact address; also the transfer password.
    pub contact: SecretString,

    /// Local output path; derived from the assigned identifier when absent.
    pub output: Option<PathBuf>,
}

impl Request {
    /// Whether the remote assigns the identifier (user elements path).
    pub fn uses_elements(&self) -> bool {
        !self.elements.is_empty()
    }

    /// The contact address in clear.
    pub fn contact(&self) -> &str {
        self.contact.expose_secret()
    }
}
