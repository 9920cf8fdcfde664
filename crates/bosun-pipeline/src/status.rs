use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one entity in one run.
///
/// ```text
/// Pending ──► Running ──► Success ──► Failed (after-hook failure only)
///    │           ├──────► Failed
///    │           └──────► Cancelled
///    ├──► Skipped
///    ├──► Cancelled
///    └──► Failed (configuration could not be resolved)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Pending,
  Running,
  Success,
  Skipped,
  Cancelled,
  Failed,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    !matches!(self, Status::Pending | Status::Running)
  }

  /// Whether dependents should treat this status as blocking them.
  pub fn blocks_dependents(self) -> bool {
    matches!(self, Status::Failed | Status::Cancelled)
  }

  pub fn can_transition_to(self, next: Status) -> bool {
    use Status::*;
    matches!(
      (self, next),
      (Pending, Running | Skipped | Cancelled | Failed)
        | (Running, Success | Failed | Cancelled)
        | (Success, Failed)
    )
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Status::Pending => "pending",
      Status::Running => "running",
      Status::Success => "success",
      Status::Skipped => "skipped",
      Status::Cancelled => "cancelled",
      Status::Failed => "failed",
    };
    f.write_str(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_states() {
    assert!(!Status::Pending.is_terminal());
    assert!(!Status::Running.is_terminal());
    for status in [Status::Success, Status::Skipped, Status::Cancelled, Status::Failed] {
      assert!(status.is_terminal());
    }
  }

  #[test]
  fn test_transitions() {
    assert!(Status::Pending.can_transition_to(Status::Running));
    assert!(Status::Pending.can_transition_to(Status::Skipped));
    assert!(Status::Running.can_transition_to(Status::Cancelled));
    assert!(Status::Success.can_transition_to(Status::Failed));

    assert!(!Status::Pending.can_transition_to(Status::Success));
    assert!(!Status::Skipped.can_transition_to(Status::Running));
    assert!(!Status::Failed.can_transition_to(Status::Success));
    assert!(!Status::Cancelled.can_transition_to(Status::Failed));
    assert!(!Status::Running.can_transition_to(Status::Pending));
  }
}
