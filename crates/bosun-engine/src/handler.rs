use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bosun_context::RunContext;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Data;

/// Everything a handler gets to see about the entity it runs for.
///
/// `run` shares the run's environment and secret maps, so values written
/// through it are visible to later entities.
#[derive(Debug, Clone)]
pub struct Invocation {
  pub id: String,
  pub name: String,
  pub run: RunContext,
  pub data: Data,
}

impl Invocation {
  /// Look up a variable in the resolved environment.
  pub fn env(&self, key: &str) -> Option<&str> {
    self.data.env.get(key)
  }

  pub fn input(&self, key: &str) -> Option<&Value> {
    self.data.inputs.get(key)
  }
}

/// The unit of work behind a task or a deployment action.
///
/// The token fires when the caller cancels or the entity's timeout elapses.
/// A handler that ignores it is abandoned at that point.
#[async_trait]
pub trait Handler: Send + Sync {
  async fn call(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
  F: Fn(Invocation, CancellationToken) -> Fut + Send + Sync,
  Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
{
  async fn call(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>> {
    (self.0)(invocation, cancel).await
  }
}

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
  F: Fn(Invocation, CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
{
  Arc::new(FnHandler(f))
}
