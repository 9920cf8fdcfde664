//! Lazily resolved configuration values.
//!
//! Entity configuration (working directory, timeout, conditions, ...) is often
//! only known once a run has started: it may depend on the environment, on a
//! secret loaded by an earlier entity, or on an async lookup. A [`Deferred`]
//! holds one of four sources and resolves it at most once.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::error::ResolveError;

type Factory<T> = Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>;
type ContextFactory<T> = Arc<dyn Fn(&RunContext) -> anyhow::Result<T> + Send + Sync>;
type AsyncFactory<T> =
  Arc<dyn Fn(RunContext, CancellationToken) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Where a deferred value comes from.
pub enum Source<T> {
  /// A literal, resolved from the start.
  Value(T),
  /// A factory that needs nothing.
  Factory(Factory<T>),
  /// A factory that reads the run context.
  Context(ContextFactory<T>),
  /// An async factory that reads the run context and may be cancelled.
  Async(AsyncFactory<T>),
}

impl<T: Clone> Clone for Source<T> {
  fn clone(&self) -> Self {
    match self {
      Source::Value(v) => Source::Value(v.clone()),
      Source::Factory(f) => Source::Factory(f.clone()),
      Source::Context(f) => Source::Context(f.clone()),
      Source::Async(f) => Source::Async(f.clone()),
    }
  }
}

/// A value resolved on first use and cached afterwards.
///
/// [`resolve`](Deferred::resolve) invokes the factory exactly once, no matter
/// how many pipeline stages ask for the value. A factory that fails (or is
/// cancelled) leaves the value unresolved so a later run can try again.
pub struct Deferred<T> {
  source: Source<T>,
  cell: OnceCell<T>,
}

impl<T> Deferred<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn value(value: T) -> Self {
    Self {
      source: Source::Value(value),
      cell: OnceCell::new(),
    }
  }

  pub fn factory<F>(factory: F) -> Self
  where
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
  {
    Self::from_source(Source::Factory(Arc::new(factory)))
  }

  pub fn with_context<F>(factory: F) -> Self
  where
    F: Fn(&RunContext) -> anyhow::Result<T> + Send + Sync + 'static,
  {
    Self::from_source(Source::Context(Arc::new(factory)))
  }

  pub fn from_async<F, Fut>(factory: F) -> Self
  where
    F: Fn(RunContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
  {
    Self::from_source(Source::Async(Arc::new(move |ctx, cancel| {
      Box::pin(factory(ctx, cancel))
    })))
  }

  pub fn from_source(source: Source<T>) -> Self {
    Self {
      source,
      cell: OnceCell::new(),
    }
  }

  pub fn source(&self) -> &Source<T> {
    &self.source
  }

  pub fn is_resolved(&self) -> bool {
    matches!(self.source, Source::Value(_)) || self.cell.initialized()
  }

  /// The resolved value, if resolution already happened.
  pub fn get(&self) -> Option<&T> {
    match &self.source {
      Source::Value(v) => Some(v),
      _ => self.cell.get(),
    }
  }

  /// Resolve against a run context, invoking the factory on first call only.
  pub async fn resolve(&self, ctx: &RunContext, cancel: &CancellationToken) -> Result<T, ResolveError> {
    if let Source::Value(v) = &self.source {
      return Ok(v.clone());
    }

    let value = self
      .cell
      .get_or_try_init(|| self.invoke(ctx, cancel))
      .await?;
    Ok(value.clone())
  }

  async fn invoke(&self, ctx: &RunContext, cancel: &CancellationToken) -> Result<T, ResolveError> {
    match &self.source {
      Source::Value(v) => Ok(v.clone()),
      Source::Factory(f) => f().map_err(ResolveError::factory),
      Source::Context(f) => f(ctx).map_err(ResolveError::factory),
      Source::Async(f) => {
        if cancel.is_cancelled() {
          return Err(ResolveError::Cancelled);
        }
        let fut = f(ctx.clone(), cancel.clone());
        tokio::select! {
          biased;
          _ = cancel.cancelled() => Err(ResolveError::Cancelled),
          result = fut => result.map_err(ResolveError::factory),
        }
      }
    }
  }
}

impl<T: Clone> Clone for Deferred<T> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      cell: self.cell.clone(),
    }
  }
}

impl<T> From<T> for Deferred<T>
where
  T: Clone + Send + Sync + 'static,
{
  fn from(value: T) -> Self {
    Self::value(value)
  }
}

impl<T> Default for Deferred<T>
where
  T: Clone + Default + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::value(T::default())
  }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match &self.source {
      Source::Value(v) => return f.debug_tuple("Deferred::Value").field(v).finish(),
      Source::Factory(_) => "Factory",
      Source::Context(_) => "Context",
      Source::Async(_) => "Async",
    };
    f.debug_struct("Deferred")
      .field("source", &kind)
      .field("value", &self.cell.get())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use bosun_bus::Bus;

  fn ctx() -> RunContext {
    RunContext::new(Bus::default()).with_env([("STAGE", "prod")].into_iter().collect())
  }

  #[tokio::test]
  async fn test_literal_is_resolved() {
    let deferred = Deferred::value(5u32);
    assert!(deferred.is_resolved());
    assert_eq!(deferred.get(), Some(&5));
    let cancel = CancellationToken::new();
    assert_eq!(deferred.resolve(&ctx(), &cancel).await.unwrap(), 5);
  }

  #[tokio::test]
  async fn test_factory_invoked_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let deferred = Deferred::factory(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok("built".to_string())
    });
    assert!(!deferred.is_resolved());

    let ctx = ctx();
    let cancel = CancellationToken::new();
    for _ in 0..3 {
      assert_eq!(deferred.resolve(&ctx, &cancel).await.unwrap(), "built");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(deferred.is_resolved());
  }

  #[tokio::test]
  async fn test_context_factory_reads_env() {
    let deferred =
      Deferred::with_context(|ctx: &RunContext| Ok(ctx.env_var("stage").unwrap_or_default()));
    let cancel = CancellationToken::new();
    assert_eq!(deferred.resolve(&ctx(), &cancel).await.unwrap(), "prod");
  }

  #[tokio::test]
  async fn test_async_factory() {
    let deferred = Deferred::from_async(|ctx: RunContext, _cancel| async move {
      tokio::time::sleep(Duration::from_millis(5)).await;
      Ok(ctx.env_var("STAGE").map(|s| s.len()).unwrap_or(0))
    });
    let cancel = CancellationToken::new();
    assert_eq!(deferred.resolve(&ctx(), &cancel).await.unwrap(), 4);
    assert_eq!(deferred.get(), Some(&4));
  }

  #[tokio::test]
  async fn test_factory_error_leaves_unresolved() {
    let deferred: Deferred<bool> = Deferred::factory(|| Err(anyhow::anyhow!("no such flag")));
    let cancel = CancellationToken::new();

    let err = deferred.resolve(&ctx(), &cancel).await.unwrap_err();
    assert_eq!(
      err,
      ResolveError::Factory {
        message: "no such flag".to_string()
      }
    );
    assert!(!deferred.is_resolved());
  }

  #[tokio::test]
  async fn test_async_factory_cancelled() {
    let deferred: Deferred<u8> = Deferred::from_async(|_ctx, _cancel| async {
      tokio::time::sleep(Duration::from_secs(60)).await;
      Ok(1)
    });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      trigger.cancel();
    });

    let err = deferred.resolve(&ctx(), &cancel).await.unwrap_err();
    assert_eq!(err, ResolveError::Cancelled);
    assert!(!deferred.is_resolved());
  }
}
