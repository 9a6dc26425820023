//! Dialogue scripts: ordered expectation steps as data.
//!
//! A [`Script`] is an ordered list of [`Step`]s. Each step pairs candidate
//! patterns with the [`Action`] to take when that pattern is the first to
//! match. Steps are immutable once built; the driver only reads them.
//!
//! # Example
//!
//! ```rust
//! use spkfetch::driver::{Action, Input, Rejection, Script, Step, StepTimeout};
//!
//! let script = Script::new("login")
//!     .step(
//!         Step::new("greeting")
//!             .try_on(r"^220 ", Action::Send(Input::line("USER anonymous")))
//!             .unwrap()
//!             .with_timeout(StepTimeout::from_secs(15)),
//!     )
//!     .step(
//!         Step::new("user")
//!             .try_on(r"^530 .*", Action::Fail(Rejection::new("login refused")))
//!             .unwrap()
//!             .try_on(r"^331 ", Action::Send(Input::hidden("user@example.com")))
//!             .unwrap(),
//!     );
//! assert_eq!(script.len(), 2);
//! ```

use std::fmt;

use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::StepTimeout;

/// Text to send to the peer.
pub enum Input {
    /// One line, followed by the connection's line ending.
    Line(String),

    /// One line that must never appear in logs or transcripts.
    Hidden(SecretString),

    /// Several lines, each followed by the line ending.
    Lines(Vec<String>),
}

impl Input {
    /// A plain line.
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(text.into())
    }

    /// A line hidden from logs (for credentials).
    pub fn hidden(text: impl Into<String>) -> Self {
        Self::Hidden(SecretString::from(text.into()))
    }

    /// Lines to send back to back.
    pub fn lines<I, T>(lines: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    /// The lines to put on the wire.
    pub(crate) fn wire_lines(&self) -> Vec<&str> {
        match self {
            Self::Line(text) => vec![text.as_str()],
            Self::Hidden(secret) => vec![secret.expose_secret()],
            Self::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    /// Whether this input is masked in logs.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden(_))
    }
}

/// Log-safe rendering: hidden input is masked.
impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(text) => write!(f, "{text:?}"),
            Self::Hidden(_) => f.write_str("********"),
            Self::Lines(lines) => write!(f, "{lines:?}"),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Input({self})")
    }
}

/// A step-specific failure reason attached to an error branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Operator-facing reason, reported next to the peer's own text.
    pub reason: String,
}

impl Rejection {
    /// Create a rejection with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// What the driver does when a branch's pattern matches.
#[derive(Debug)]
pub enum Action {
    /// Send input and advance to the next step.
    Send(Input),

    /// Store the pattern's named groups in the session captures, send
    /// input, and advance.
    CaptureAndSend(Input),

    /// Send input and run the same step again (pager and interstitial
    /// prompts). Bounded by the session's reply limit.
    Reply(Input),

    /// Advance to the next step without sending anything.
    Advance,

    /// End the session in failure.
    Fail(Rejection),
}

/// One pattern and the action it triggers.
#[derive(Debug)]
pub struct Branch {
    /// Pattern tested against received text.
    pub pattern: Regex,

    /// Action taken when this branch wins.
    pub action: Action,
}

/// One node of a dialogue script.
#[derive(Debug)]
pub struct Step {
    /// Name used in logs and error reports.
    pub name: String,

    /// Branches in priority order.
    pub branches: Vec<Branch>,

    /// Timeout override; the session default applies when `None`.
    pub timeout: Option<StepTimeout>,
}

impl Step {
    /// Create a step with no branches.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            timeout: None,
        }
    }

    /// Add a branch with a compiled pattern.
    pub fn on(mut self, pattern: Regex, action: Action) -> Self {
        self.branches.push(Branch { pattern, action });
        self
    }

    /// Add a branch, compiling the pattern.
    pub fn try_on(self, pattern: &str, action: Action) -> Result<Self, regex::Error> {
        Ok(self.on(Regex::new(pattern)?, action))
    }

    /// Set a timeout for this step.
    pub fn with_timeout(mut self, timeout: StepTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Patterns of all branches, in priority order.
    pub fn patterns(&self) -> Vec<Regex> {
        self.branches.iter().map(|b| b.pattern.clone()).collect()
    }
}

/// An ordered dialogue.
#[derive(Debug)]
pub struct Script {
    /// Name used in logs.
    pub name: String,

    steps: Vec<Step>,
}

impl Script {
    /// Create an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Steps in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the script has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
