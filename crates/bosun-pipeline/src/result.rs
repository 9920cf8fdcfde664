use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::{ExecutionError, Status};

/// Outcome of one entity in one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
  pub id: String,
  pub name: String,
  pub status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    serialize_with = "serialize_error"
  )]
  pub error: Option<ExecutionError>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      status: Status::Pending,
      output: None,
      error: None,
      started_at: None,
      finished_at: None,
    }
  }

  /// Move to `next`, stamping start and finish times.
  ///
  /// Illegal moves are logged and ignored; returns whether the move happened.
  pub fn transition(&mut self, next: Status) -> bool {
    if !self.status.can_transition_to(next) {
      warn!(
        id = %self.id,
        from = %self.status,
        to = %next,
        "illegal_status_transition"
      );
      return false;
    }

    let now = Utc::now();
    if next == Status::Running {
      self.started_at = Some(now);
    }
    if next.is_terminal() {
      self.finished_at = Some(now);
    }
    self.status = next;
    true
  }

  pub fn succeed(&mut self, output: Option<Value>) -> bool {
    let moved = self.transition(Status::Success);
    if moved {
      self.output = output;
    }
    moved
  }

  pub fn fail(&mut self, error: ExecutionError) -> bool {
    let moved = self.transition(Status::Failed);
    if moved {
      self.error = Some(error);
    }
    moved
  }

  pub fn cancel(&mut self) -> bool {
    let moved = self.transition(Status::Cancelled);
    if moved {
      self.error = Some(ExecutionError::Cancelled);
    }
    moved
  }

  pub fn skip(&mut self) -> bool {
    self.transition(Status::Skipped)
  }

  pub fn duration(&self) -> Option<chrono::Duration> {
    Some(self.finished_at? - self.started_at?)
  }
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
  pub results: Vec<RunResult>,
  pub status: Status,
  #[serde(
    skip_serializing_if = "Option::is_none",
    serialize_with = "serialize_error"
  )]
  pub exception: Option<ExecutionError>,
}

impl Summary {
  /// Summarize entity results: Failed if any of them failed, else Success.
  pub fn from_results(results: Vec<RunResult>) -> Self {
    let status = if results.iter().any(|r| r.status == Status::Failed) {
      Status::Failed
    } else {
      Status::Success
    };
    Self {
      results,
      status,
      exception: None,
    }
  }

  /// A run that failed before any entity ran.
  pub fn aborted(exception: ExecutionError) -> Self {
    Self {
      results: Vec::new(),
      status: Status::Failed,
      exception: Some(exception),
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == Status::Success
  }

  pub fn get(&self, id: &str) -> Option<&RunResult> {
    self.results.iter().find(|r| r.id == id)
  }

  pub fn status_of(&self, id: &str) -> Option<Status> {
    self.get(id).map(|r| r.status)
  }

  pub fn failed(&self) -> impl Iterator<Item = &RunResult> {
    self.results.iter().filter(|r| r.status == Status::Failed)
  }

  pub fn has_cancellations(&self) -> bool {
    self.results.iter().any(|r| r.status == Status::Cancelled)
  }
}

fn serialize_error<S: Serializer>(
  error: &Option<ExecutionError>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  match error {
    Some(e) => serializer.serialize_str(&e.to_string()),
    None => serializer.serialize_none(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lifecycle_stamps_times() {
    let mut result = RunResult::new("build", "Build");
    assert!(result.transition(Status::Running));
    assert!(result.started_at.is_some());
    assert!(result.finished_at.is_none());

    assert!(result.succeed(Some(serde_json::json!({ "exit_code": 0 }))));
    assert!(result.finished_at.is_some());
    assert!(result.duration().is_some());
    assert_eq!(result.status, Status::Success);
  }

  #[test]
  fn test_illegal_transition_is_ignored() {
    let mut result = RunResult::new("build", "Build");
    result.skip();
    assert!(!result.transition(Status::Running));
    assert!(!result.fail(ExecutionError::handler("late")));
    assert_eq!(result.status, Status::Skipped);
    assert!(result.error.is_none());
  }

  #[test]
  fn test_after_hook_can_fail_a_success() {
    let mut result = RunResult::new("deploy", "Deploy");
    result.transition(Status::Running);
    result.succeed(None);
    assert!(result.fail(ExecutionError::hook(
      "after:deploy",
      ExecutionError::handler("smoke test failed")
    )));
    assert_eq!(result.status, Status::Failed);
  }

  #[test]
  fn test_summary_status() {
    let mut ok = RunResult::new("a", "A");
    ok.transition(Status::Running);
    ok.succeed(None);
    let mut skipped = RunResult::new("b", "B");
    skipped.skip();
    let summary = Summary::from_results(vec![ok.clone(), skipped]);
    assert!(summary.is_success());

    let mut failed = RunResult::new("c", "C");
    failed.fail(ExecutionError::handler("boom"));
    let summary = Summary::from_results(vec![ok, failed]);
    assert_eq!(summary.status, Status::Failed);
    assert_eq!(summary.failed().count(), 1);
    assert_eq!(summary.status_of("c"), Some(Status::Failed));
  }

  #[test]
  fn test_aborted_summary_serializes_exception() {
    let summary = Summary::aborted(ExecutionError::UnknownTarget("ship".to_string()));
    assert_eq!(summary.status, Status::Failed);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["exception"], "unknown target: ship");
  }
}
