//! The run context shared by every entity in one orchestrator run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bosun_bus::Bus;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::services::Services;
use crate::variables::Variables;

/// Per-run state threaded through every pipeline.
///
/// Cloning a `RunContext` shares the environment and secret maps, so a value
/// written by one entity is visible to every later entity of the same run.
/// Sub-pipelines (event hooks) run on a [`fork`](RunContext::fork) instead and
/// hand their writes back through [`join`](RunContext::join).
#[derive(Clone)]
pub struct RunContext {
  env: Arc<RwLock<Variables>>,
  secrets: Arc<RwLock<Variables>>,
  services: Services,
  bus: Bus,
  cwd: PathBuf,
  cancel: CancellationToken,
}

impl RunContext {
  pub fn new(bus: Bus) -> Self {
    Self {
      env: Arc::default(),
      secrets: Arc::default(),
      services: Services::new(),
      bus,
      cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_env(self, env: Variables) -> Self {
    *self.env.write() = env;
    self
  }

  pub fn with_secrets(self, secrets: Variables) -> Self {
    *self.secrets.write() = secrets;
    self
  }

  pub fn with_services(mut self, services: Services) -> Self {
    self.services = services;
    self
  }

  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = cwd.into();
    self
  }

  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn bus(&self) -> &Bus {
    &self.bus
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  pub fn cwd(&self) -> &Path {
    &self.cwd
  }

  /// The caller's cancellation token.
  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Snapshot of the environment.
  pub fn env(&self) -> Variables {
    self.env.read().clone()
  }

  pub fn env_var(&self, key: &str) -> Option<String> {
    self.env.read().get(key).map(str::to_string)
  }

  pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
    self.env.write().insert(key, value);
  }

  /// Snapshot of the secrets.
  pub fn secrets(&self) -> Variables {
    self.secrets.read().clone()
  }

  pub fn secret(&self, key: &str) -> Option<String> {
    self.secrets.read().get(key).map(str::to_string)
  }

  pub fn set_secret(&self, key: impl Into<String>, value: impl Into<String>) {
    self.secrets.write().insert(key, value);
  }

  /// Copy the environment and secrets into a context of their own.
  ///
  /// The fork shares services, bus, working directory, and cancellation with
  /// this context. Its writes stay local until [`join`](RunContext::join).
  pub fn fork(&self) -> Fork {
    let env = self.env();
    let secrets = self.secrets();
    let context = Self {
      env: Arc::new(RwLock::new(env.clone())),
      secrets: Arc::new(RwLock::new(secrets.clone())),
      services: self.services.clone(),
      bus: self.bus.clone(),
      cwd: self.cwd.clone(),
      cancel: self.cancel.clone(),
    };
    Fork {
      context,
      base_env: env,
      base_secrets: secrets,
    }
  }

  /// Write back the keys a fork added or changed.
  ///
  /// Keys the fork removed are left alone here. Returns what was merged.
  pub fn join(&self, fork: &Fork) -> Changes {
    let changes = Changes {
      env: fork.context.env().changes_since(&fork.base_env),
      secrets: fork.context.secrets().changes_since(&fork.base_secrets),
    };

    if !changes.is_empty() {
      debug!(
        env = ?changes.env.keys().collect::<Vec<_>>(),
        secrets = changes.secrets.len(),
        "merging forked context"
      );
      self.env.write().merge(&changes.env);
      self.secrets.write().merge(&changes.secrets);
    }

    changes
  }
}

impl std::fmt::Debug for RunContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunContext")
      .field("env", &self.env.read().len())
      .field("secrets", &self.secrets.read().len())
      .field("cwd", &self.cwd)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}

/// A forked context plus the values it started from.
pub struct Fork {
  pub context: RunContext,
  base_env: Variables,
  base_secrets: Variables,
}

/// Keys a fork added or changed.
#[derive(Debug, Clone, Default)]
pub struct Changes {
  pub env: Variables,
  pub secrets: Variables,
}

impl Changes {
  pub fn is_empty(&self) -> bool {
    self.env.is_empty() && self.secrets.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn context() -> RunContext {
    RunContext::new(Bus::default())
      .with_env([("HOME", "/root")].into_iter().collect())
      .with_secrets([("TOKEN", "t0")].into_iter().collect())
  }

  #[test]
  fn test_clones_share_maps() {
    let ctx = context();
    let other = ctx.clone();
    other.set_env("CI", "true");
    other.set_secret("KEY", "k");

    assert_eq!(ctx.env_var("ci").as_deref(), Some("true"));
    assert_eq!(ctx.secret("key").as_deref(), Some("k"));
  }

  #[test]
  fn test_fork_isolated_until_join() {
    let ctx = context();
    let fork = ctx.fork();
    fork.context.set_env("STAGE", "prod");
    fork.context.set_secret("TOKEN", "t1");

    assert_eq!(ctx.env_var("STAGE"), None);
    assert_eq!(ctx.secret("TOKEN").as_deref(), Some("t0"));

    let changes = ctx.join(&fork);
    assert_eq!(changes.env.get("STAGE"), Some("prod"));
    assert_eq!(changes.secrets.get("TOKEN"), Some("t1"));
    assert_eq!(ctx.env_var("STAGE").as_deref(), Some("prod"));
    assert_eq!(ctx.secret("TOKEN").as_deref(), Some("t1"));
  }

  #[test]
  fn test_join_merges_only_new_or_changed() {
    let ctx = context();
    let fork = ctx.fork();

    // Parent changes after the fork must survive an unchanged key in the fork.
    ctx.set_env("HOME", "/home/ci");
    fork.context.set_env("EXTRA", "1");

    let changes = ctx.join(&fork);
    assert_eq!(changes.env.len(), 1);
    assert_eq!(ctx.env_var("HOME").as_deref(), Some("/home/ci"));
    assert_eq!(ctx.env_var("EXTRA").as_deref(), Some("1"));
  }

  #[test]
  fn test_join_never_removes() {
    let ctx = context();
    let fork = ctx.fork();
    fork.context.env.write().remove("HOME");

    let changes = ctx.join(&fork);
    assert!(changes.is_empty());
    assert_eq!(ctx.env_var("HOME").as_deref(), Some("/root"));
  }

  #[test]
  fn test_fork_shares_cancellation() {
    let ctx = context();
    let fork = ctx.fork();
    ctx.cancellation().cancel();
    assert!(fork.context.cancellation().is_cancelled());
  }
}
