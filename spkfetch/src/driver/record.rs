//! Records of executed steps.

use std::time::Duration;

use indexmap::IndexMap;

/// Result of a single step invocation.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step name.
    pub step: String,

    /// 1-based position in the session (replies count as new invocations).
    pub index: usize,

    /// Index of the branch that fired.
    pub branch: usize,

    /// Input sent in response, masked if hidden.
    pub input: Option<String>,

    /// Text the winning pattern matched.
    pub matched: String,

    /// Everything received during this step, up to the end of the match.
    pub raw_output: String,

    /// Time taken for this step.
    pub elapsed: Duration,
}

/// Result of a completed session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Every step invocation in order.
    pub steps: Vec<StepRecord>,

    /// Values captured by `CaptureAndSend` branches.
    pub captures: IndexMap<String, String>,

    /// Total time for the session.
    pub elapsed: Duration,
}

impl Transcript {
    /// A captured value by name.
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    /// All received text concatenated.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.raw_output.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// The record for the last step that ran.
    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }
}
