use bosun_graph::{Cycle, MissingDependency};

/// Why an entity or a run did not succeed.
///
/// Stored inside [`RunResult`](crate::RunResult) and
/// [`Summary`](crate::Summary); never raised across a pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
  /// The caller's token fired or the entity timed out.
  #[error("cancelled")]
  Cancelled,

  /// A deferred configuration value could not be resolved.
  #[error("failed to resolve '{field}': {message}")]
  Resolution { field: String, message: String },

  /// The unit-of-work handler returned an error.
  #[error("{message}")]
  Handler { message: String },

  /// A before or after hook failed.
  #[error("hook '{hook}' failed: {source}")]
  Hook {
    hook: String,
    #[source]
    source: Box<ExecutionError>,
  },

  /// Entities need ids that are not registered.
  #[error("missing dependencies: {}", describe_missing(.entries))]
  MissingDependencies { entries: Vec<MissingDependency> },

  /// The needs graph contains cycles.
  #[error("cyclical references: {}", describe_cycles(.cycles))]
  CyclicalReferences { cycles: Vec<Cycle> },

  /// A requested target is not registered.
  #[error("unknown target: {0}")]
  UnknownTarget(String),

  /// No targets were requested.
  #[error("no targets given")]
  NoTargets,
}

impl ExecutionError {
  pub fn handler(message: impl Into<String>) -> Self {
    Self::Handler {
      message: message.into(),
    }
  }

  pub fn resolution(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Resolution {
      field: field.into(),
      message: message.into(),
    }
  }

  pub fn hook(hook: impl Into<String>, source: ExecutionError) -> Self {
    Self::Hook {
      hook: hook.into(),
      source: Box::new(source),
    }
  }

  /// Whether this error (or the error a hook wraps) is a cancellation.
  pub fn is_cancelled(&self) -> bool {
    match self {
      Self::Cancelled => true,
      Self::Hook { source, .. } => source.is_cancelled(),
      _ => false,
    }
  }
}

impl From<anyhow::Error> for ExecutionError {
  fn from(error: anyhow::Error) -> Self {
    match error.downcast::<ExecutionError>() {
      Ok(typed) => typed,
      Err(error) => Self::handler(format!("{:#}", error)),
    }
  }
}

fn describe_missing(entries: &[MissingDependency]) -> String {
  entries
    .iter()
    .map(|m| format!("{} needs [{}]", m.id, m.missing.join(", ")))
    .collect::<Vec<_>>()
    .join("; ")
}

fn describe_cycles(cycles: &[Cycle]) -> String {
  cycles
    .iter()
    .map(|c| {
      let mut ids = c.ids.clone();
      if let Some(first) = c.ids.first() {
        ids.push(first.clone());
      }
      ids.join(" -> ")
    })
    .collect::<Vec<_>>()
    .join("; ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hook_error_names_hook() {
    let err = ExecutionError::hook("after:deploy", ExecutionError::handler("exit code 2"));
    assert_eq!(err.to_string(), "hook 'after:deploy' failed: exit code 2");
    assert!(!err.is_cancelled());
  }

  #[test]
  fn test_structural_messages() {
    let err = ExecutionError::MissingDependencies {
      entries: vec![MissingDependency {
        id: "deploy".to_string(),
        missing: vec!["build".to_string(), "lint".to_string()],
      }],
    };
    assert_eq!(err.to_string(), "missing dependencies: deploy needs [build, lint]");

    let err = ExecutionError::CyclicalReferences {
      cycles: vec![Cycle {
        ids: vec!["a".to_string(), "b".to_string()],
      }],
    };
    assert_eq!(err.to_string(), "cyclical references: a -> b -> a");
  }

  #[test]
  fn test_from_anyhow_keeps_context_chain() {
    let err: ExecutionError = anyhow::anyhow!("disk full")
      .context("writing artifact")
      .into();
    assert_eq!(err, ExecutionError::handler("writing artifact: disk full"));
  }

  #[test]
  fn test_from_anyhow_recovers_typed_error() {
    let err: ExecutionError = anyhow::Error::new(ExecutionError::Cancelled).into();
    assert!(err.is_cancelled());
  }
}
