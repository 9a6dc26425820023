//! Per-step time budgets.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Time budget for one expectation step.
///
/// `Never` is an explicit sentinel for steps where a long silence means
/// the remote is still working, such as a numerical integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTimeout {
    /// Give up once this much time has passed without a match.
    After(Duration),

    /// Wait until a pattern matches or the peer disconnects.
    Never,
}

impl StepTimeout {
    /// Build from a seconds value where zero means no limit.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Never
        } else {
            Self::After(Duration::from_secs(secs))
        }
    }

    /// Deadline measured from `start`, or `None` when unbounded.
    ///
    /// Durations too large to represent as an instant are treated as
    /// unbounded.
    pub fn deadline_from(self, start: Instant) -> Option<Instant> {
        match self {
            Self::After(duration) => start.checked_add(duration),
            Self::Never => None,
        }
    }

    /// Whether this budget is unbounded.
    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Never)
    }
}

impl From<Duration> for StepTimeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl fmt::Display for StepTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::After(duration) => write!(f, "{duration:?}"),
            Self::Never => f.write_str("no time limit"),
        }
    }
}
