use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bosun_bus::Payload;
use bosun_context::{Deferred, ResolveError, RunContext};
use bosun_graph::Vertex;
use bosun_pipeline::{ExecutionError, Middleware, Next, Pipeline, Status};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::entity::{Entity, EntityContext};
use crate::{Data, Phase};

/// The standard pipeline, outermost first: `[Execute, ApplyContext]`.
pub fn default_pipeline<E: Entity>() -> Pipeline<EntityContext<E>> {
  Pipeline::builder()
    .stage(Execute::<E>::new())
    .stage(ApplyContext::<E>::new())
    .build()
}

/// Resolves the entity's [`Definition`](crate::Definition) into
/// [`Data`] before the rest of the pipeline runs.
pub struct ApplyContext<E> {
  _entity: PhantomData<fn() -> E>,
}

impl<E> ApplyContext<E> {
  pub fn new() -> Self {
    Self {
      _entity: PhantomData,
    }
  }
}

impl<E> Default for ApplyContext<E> {
  fn default() -> Self {
    Self::new()
  }
}

async fn resolve<T>(
  field: &str,
  deferred: &Deferred<T>,
  run: &RunContext,
  cancel: &CancellationToken,
) -> Result<T, ExecutionError>
where
  T: Clone + Send + Sync + 'static,
{
  deferred.resolve(run, cancel).await.map_err(|e| match e {
    ResolveError::Cancelled => ExecutionError::Cancelled,
    ResolveError::Factory { message } => ExecutionError::resolution(field, message),
  })
}

#[async_trait]
impl<E: Entity> Middleware<EntityContext<E>> for ApplyContext<E> {
  fn name(&self) -> &str {
    "apply-context"
  }

  async fn handle(
    &self,
    ctx: &mut EntityContext<E>,
    next: Next<EntityContext<E>>,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    let entity = ctx.entity.clone();
    let definition = entity.definition();

    let cwd = resolve("cwd", &definition.cwd, &ctx.run, cancel).await?;
    let timeout = resolve("timeout", &definition.timeout, &ctx.run, cancel).await?;
    let force = resolve("force", &definition.force, &ctx.run, cancel).await?;
    let condition = resolve("if", &definition.condition, &ctx.run, cancel).await?;
    let overlay = resolve("env", &definition.env, &ctx.run, cancel).await?;
    let inputs = resolve("inputs", &definition.inputs, &ctx.run, cancel).await?;

    let mut env = ctx.run.env();
    env.merge(&overlay);

    ctx.data = Data {
      cwd: match cwd {
        Some(dir) => ctx.run.cwd().join(dir),
        None => ctx.run.cwd().to_path_buf(),
      },
      timeout: timeout.or(ctx.default_timeout),
      force,
      condition,
      env,
      inputs,
    };

    debug!(
      entity_id = %entity.id(),
      cwd = %ctx.data.cwd.display(),
      timeout = ?ctx.data.timeout,
      force = ctx.data.force,
      condition = ctx.data.condition,
      "entity_context_applied"
    );

    next.run(ctx, cancel).await
  }
}

/// Gates, times, and runs the entity's handler along with its hooks.
///
/// Runs the inner stages first so gating sees resolved values, then:
///
/// 1. skip when a dependency is blocked (unless forced) or the condition is false
/// 2. under a child token bound to the resolved timeout, run the
///    `before:<action>` hook and then the handler; a hook failure means the
///    handler never runs
/// 3. on timeout or cancellation, cancel the child token and settle as cancelled
/// 4. run the `after:<action>` hook when the handler succeeded; a failure turns
///    the success into a failure
///
/// Every outcome is recorded on the context's [`RunResult`](bosun_pipeline::RunResult)
/// and published on the bus. This stage never returns an error.
pub struct Execute<E> {
  _entity: PhantomData<fn() -> E>,
}

impl<E> Execute<E> {
  pub fn new() -> Self {
    Self {
      _entity: PhantomData,
    }
  }
}

impl<E> Default for Execute<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Entity> Execute<E> {
  async fn skip(&self, ctx: &mut EntityContext<E>, reason: &str) {
    info!(entity_id = %ctx.entity.id(), reason, "entity_skipped");
    ctx.result.skip();
    ctx
      .emit(Payload::Skipped {
        id: ctx.result.id.clone(),
        name: ctx.result.name.clone(),
        reason: reason.to_string(),
      })
      .await;
  }

  async fn settle_error(&self, ctx: &mut EntityContext<E>, error: ExecutionError) {
    if error.is_cancelled() {
      warn!(entity_id = %ctx.entity.id(), error = %error, "entity_cancelled");
      ctx.result.cancel();
      ctx
        .emit(Payload::Cancelled {
          id: ctx.result.id.clone(),
          name: ctx.result.name.clone(),
        })
        .await;
    } else {
      self.fail(ctx, error).await;
    }
  }

  async fn fail(&self, ctx: &mut EntityContext<E>, error: ExecutionError) {
    error!(entity_id = %ctx.entity.id(), error = %error, "entity_failed");
    let message = error.to_string();
    ctx.result.fail(error);
    ctx
      .emit(Payload::Failed {
        id: ctx.result.id.clone(),
        name: ctx.result.name.clone(),
        error: message,
      })
      .await;
  }

  /// Run a hook task on a fork of the run context and merge back what it set.
  async fn run_hook(
    &self,
    ctx: &mut EntityContext<E>,
    phase: Phase,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    let Some(task) = ctx.entity.hook(phase).cloned() else {
      return Ok(());
    };
    let hook = format!("{}:{}", phase, ctx.entity.topic());
    debug!(entity_id = %ctx.entity.id(), hook = %hook, task_id = %task.id(), "hook_started");

    let fork = ctx.run.fork();
    let mut hook_ctx =
      EntityContext::new(fork.context.clone(), task).with_default_timeout(ctx.default_timeout);
    drive(&default_pipeline(), &mut hook_ctx, cancel).await;

    let changes = ctx.run.join(&fork);
    ctx.data.env.merge(&changes.env);
    ctx.data.env.merge(&changes.secrets);

    match hook_ctx.result.status {
      Status::Success | Status::Skipped => Ok(()),
      Status::Cancelled => Err(ExecutionError::hook(hook, ExecutionError::Cancelled)),
      _ => {
        let source = hook_ctx
          .result
          .error
          .unwrap_or_else(|| ExecutionError::handler("hook did not complete"));
        Err(ExecutionError::hook(hook, source))
      }
    }
  }

  /// The before hook followed by the handler, both bounded by the timeout.
  async fn invoke(
    &self,
    ctx: &mut EntityContext<E>,
    cancel: &CancellationToken,
  ) -> Result<Option<Value>, ExecutionError> {
    let token = cancel.child_token();
    let entity = Arc::clone(&ctx.entity);
    let timeout = ctx.data.timeout;
    let deadline = async move {
      match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
      }
    };
    let work = async {
      self.run_hook(ctx, Phase::Before, &token).await?;
      let invocation = ctx.invocation();
      entity.invoke(invocation, token.clone()).await.map_err(|e| {
        if token.is_cancelled() {
          ExecutionError::Cancelled
        } else {
          ExecutionError::from(e)
        }
      })
    };

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        token.cancel();
        Err(ExecutionError::Cancelled)
      }
      _ = deadline => {
        token.cancel();
        warn!(entity_id = %entity.id(), timeout = ?timeout, "entity_timed_out");
        Err(ExecutionError::Cancelled)
      }
      result = work => result,
    }
  }
}

#[async_trait]
impl<E: Entity> Middleware<EntityContext<E>> for Execute<E> {
  fn name(&self) -> &str {
    "execute"
  }

  async fn handle(
    &self,
    ctx: &mut EntityContext<E>,
    next: Next<EntityContext<E>>,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError> {
    if cancel.is_cancelled() {
      self.settle_error(ctx, ExecutionError::Cancelled).await;
      return Ok(());
    }

    if let Err(error) = next.run(ctx, cancel).await {
      self.settle_error(ctx, error).await;
      return Ok(());
    }

    if ctx.upstream_blocked && !ctx.data.force {
      self.skip(ctx, "a dependency failed or was cancelled").await;
      return Ok(());
    }
    if !ctx.data.condition {
      self.skip(ctx, "condition is false").await;
      return Ok(());
    }

    ctx.result.transition(Status::Running);
    info!(
      entity_id = %ctx.entity.id(),
      kind = E::KIND,
      topic = %ctx.entity.topic(),
      "entity_started"
    );
    ctx
      .emit(Payload::Started {
        id: ctx.result.id.clone(),
        name: ctx.result.name.clone(),
      })
      .await;

    match self.invoke(ctx, cancel).await {
      Ok(output) => {
        info!(entity_id = %ctx.entity.id(), "entity_completed");
        ctx.result.succeed(output.clone());
        ctx
          .emit(Payload::Completed {
            id: ctx.result.id.clone(),
            name: ctx.result.name.clone(),
            output,
          })
          .await;
      }
      Err(error) => {
        self.settle_error(ctx, error).await;
        return Ok(());
      }
    }

    if let Err(error) = self.run_hook(ctx, Phase::After, cancel).await {
      self.fail(ctx, error).await;
    }
    Ok(())
  }
}

/// Run one entity's pipeline and make sure its result ends up terminal.
pub(crate) async fn drive<E: Entity>(
  pipeline: &Pipeline<EntityContext<E>>,
  ctx: &mut EntityContext<E>,
  cancel: &CancellationToken,
) {
  if let Err(error) = pipeline.run(ctx, cancel).await {
    if error.is_cancelled() {
      ctx.result.cancel();
    } else {
      ctx.result.fail(error);
    }
  }
  if !ctx.result.status.is_terminal() {
    ctx
      .result
      .fail(ExecutionError::handler("pipeline finished without a result"));
  }
}
