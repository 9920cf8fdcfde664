use std::path::PathBuf;
use std::time::Duration;

use bosun_context::{Deferred, Variables};
use serde_json::{Map, Value};

/// Configuration every entity carries, resolved when the entity runs.
#[derive(Debug, Clone)]
pub struct Definition {
  /// Working directory. Relative paths are joined onto the run's directory.
  pub cwd: Deferred<Option<PathBuf>>,
  /// Time allowed for the handler. `None` falls back to the runner default.
  pub timeout: Deferred<Option<Duration>>,
  /// Run even when a dependency failed or was cancelled.
  pub force: Deferred<bool>,
  /// Run only when this resolves to true.
  pub condition: Deferred<bool>,
  /// Variables layered over the run environment.
  pub env: Deferred<Variables>,
  /// Free-form inputs handed to the handler.
  pub inputs: Deferred<Map<String, Value>>,
}

impl Default for Definition {
  fn default() -> Self {
    Self {
      cwd: Deferred::value(None),
      timeout: Deferred::value(None),
      force: Deferred::value(false),
      condition: Deferred::value(true),
      env: Deferred::default(),
      inputs: Deferred::default(),
    }
  }
}

impl Definition {
  pub fn with_cwd(mut self, cwd: Deferred<Option<PathBuf>>) -> Self {
    self.cwd = cwd;
    self
  }

  pub fn with_timeout(mut self, timeout: Deferred<Option<Duration>>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_force(mut self, force: Deferred<bool>) -> Self {
    self.force = force;
    self
  }

  pub fn with_condition(mut self, condition: Deferred<bool>) -> Self {
    self.condition = condition;
    self
  }

  pub fn with_env(mut self, env: Deferred<Variables>) -> Self {
    self.env = env;
    self
  }

  pub fn with_inputs(mut self, inputs: Deferred<Map<String, Value>>) -> Self {
    self.inputs = inputs;
    self
  }
}

/// The resolved form of a [`Definition`] for one run of one entity.
#[derive(Debug, Clone, Default)]
pub struct Data {
  pub cwd: PathBuf,
  pub timeout: Option<Duration>,
  pub force: bool,
  pub condition: bool,
  /// Run environment plus the entity's overlay, plus anything hooks added.
  pub env: Variables,
  pub inputs: Map<String, Value>,
}
