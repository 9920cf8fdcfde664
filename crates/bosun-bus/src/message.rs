//! Messages published on the bus.

use std::fmt;

use bosun_graph::{Cycle, MissingDependency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a diagnostic message. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Trace,
  Debug,
  Info,
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Severity::Trace => "trace",
      Severity::Debug => "debug",
      Severity::Info => "info",
      Severity::Warning => "warning",
      Severity::Error => "error",
    };
    f.write_str(s)
  }
}

/// Free-form diagnostic text with a severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
  pub severity: Severity,
  pub text: String,
}

/// What a message is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
  /// An entity has started running its handler.
  Started { id: String, name: String },

  /// An entity has completed successfully.
  Completed {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<serde_json::Value>,
  },

  /// An entity has failed.
  Failed {
    id: String,
    name: String,
    error: String,
  },

  /// An entity was cancelled by the caller or by its timeout.
  Cancelled { id: String, name: String },

  /// An entity did not run.
  Skipped {
    id: String,
    name: String,
    reason: String,
  },

  /// Entities need ids that are not registered. The run was aborted.
  FoundMissingDependencies { entries: Vec<MissingDependency> },

  /// The needs graph contains cycles. The run was aborted.
  FoundCyclicalReferences { cycles: Vec<Cycle> },

  /// Diagnostic output, filtered by the bus minimum severity.
  Diagnostic(Diagnostic),
}

impl Payload {
  /// Event part of the topic (`<kind>:<event>`).
  pub fn event(&self) -> &'static str {
    match self {
      Payload::Started { .. } => "started",
      Payload::Completed { .. } => "completed",
      Payload::Failed { .. } => "failed",
      Payload::Cancelled { .. } => "cancelled",
      Payload::Skipped { .. } => "skipped",
      Payload::FoundMissingDependencies { .. } => "missing-dependencies",
      Payload::FoundCyclicalReferences { .. } => "cyclical-references",
      Payload::Diagnostic(_) => "diagnostic",
    }
  }
}

/// A message routed by topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub topic: String,
  pub timestamp: DateTime<Utc>,
  pub payload: Payload,
}

impl Message {
  /// Build a message for an entity kind (`task`, `job`, `deploy`, ...).
  /// The topic is `<kind>:<event>`.
  pub fn new(kind: &str, payload: Payload) -> Self {
    let topic = match &payload {
      Payload::Diagnostic(d) => format!("diagnostic:{}", d.severity),
      other => format!("{}:{}", kind, other.event()),
    };
    Self {
      topic,
      timestamp: Utc::now(),
      payload,
    }
  }

  /// Build a diagnostic message. The topic is `diagnostic:<severity>`.
  pub fn diagnostic(severity: Severity, text: impl Into<String>) -> Self {
    Self::new(
      "diagnostic",
      Payload::Diagnostic(Diagnostic {
        severity,
        text: text.into(),
      }),
    )
  }

  pub fn severity(&self) -> Option<Severity> {
    match &self.payload {
      Payload::Diagnostic(d) => Some(d.severity),
      _ => None,
    }
  }
}
