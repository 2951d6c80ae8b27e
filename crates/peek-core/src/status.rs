//! Task lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a task's browser instance.
///
/// Legal transitions: `NotStarted -> Starting -> Running`, and any
/// non-terminal state may move to `Failed` or `Stopped`. Terminal states
/// never transition again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Known task id with no browser launched yet.
    NotStarted,
    /// Browser process spawned, debug endpoint not yet responding.
    Starting,
    /// Debug endpoint answered; the instance is usable.
    Running,
    /// Launch or automation failed.
    Failed,
    /// Terminated on request.
    Stopped,
}

impl TaskStatus {
    /// Wire-format string (matches the serde snake_case rename).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// True for states that never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::NotStarted => matches!(next, Self::Starting | Self::Failed | Self::Stopped),
            Self::Starting => matches!(next, Self::Running | Self::Failed | Self::Stopped),
            Self::Running => matches!(next, Self::Failed | Self::Stopped),
            Self::Failed | Self::Stopped => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
