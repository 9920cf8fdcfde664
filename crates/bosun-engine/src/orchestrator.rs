use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use bosun_bus::{Message, Payload, Severity};
use bosun_context::RunContext;
use bosun_graph::{GraphError, Registry, Vertex, compute_order, detect_cycles, detect_missing};
use bosun_pipeline::{ExecutionError, Pipeline, Status, Summary};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::entity::{Entity, EntityContext};
use crate::middleware::{default_pipeline, drive};
use crate::{Deployment, Job, Task};

/// Runs a dependency-ordered set of entities one at a time.
///
/// Entities never run concurrently: entity N+1 starts only after entity N's
/// pipeline has settled. Environment and secrets written by earlier entities
/// are visible to later ones through the shared [`RunContext`].
pub struct Orchestrator<E: Entity> {
  registry: Arc<Registry<Arc<E>>>,
  pipeline: Pipeline<EntityContext<E>>,
  default_timeout: Option<Duration>,
}

pub type TaskRunner = Orchestrator<Task>;
pub type JobRunner = Orchestrator<Job>;
pub type DeploymentRunner = Orchestrator<Deployment>;

impl<E: Entity> Orchestrator<E> {
  pub fn new(registry: impl Into<Arc<Registry<Arc<E>>>>) -> Self {
    Self {
      registry: registry.into(),
      pipeline: default_pipeline(),
      default_timeout: None,
    }
  }

  /// Replace the standard `[Execute, ApplyContext]` pipeline.
  pub fn with_pipeline(mut self, pipeline: Pipeline<EntityContext<E>>) -> Self {
    self.pipeline = pipeline;
    self
  }

  /// Timeout applied to entities that do not declare one.
  pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.default_timeout = timeout;
    self
  }

  pub fn registry(&self) -> &Registry<Arc<E>> {
    &self.registry
  }

  /// Validate the registry and compute the run order without running anything.
  pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<Arc<E>>, ExecutionError> {
    if targets.is_empty() {
      return Err(ExecutionError::NoTargets);
    }

    check_structure(&self.registry)?;

    let order = compute_order(&self.registry, targets).map_err(|e| match e {
      GraphError::UnknownTarget(id) => ExecutionError::UnknownTarget(id),
      other => ExecutionError::handler(other.to_string()),
    })?;
    Ok(order.into_iter().cloned().collect())
  }

  /// Run `targets` and everything they need, cancelled by the context's token.
  pub async fn run<S>(&self, ctx: &RunContext, targets: &[S]) -> Summary
  where
    S: AsRef<str> + Debug + Sync,
  {
    self.run_with_token(ctx, targets, ctx.cancellation()).await
  }

  /// Run `targets` and everything they need, cancelled by `cancel`.
  #[instrument(
    name = "orchestrator_run",
    skip(self, ctx, cancel),
    fields(kind = E::KIND)
  )]
  pub async fn run_with_token<S>(
    &self,
    ctx: &RunContext,
    targets: &[S],
    cancel: &CancellationToken,
  ) -> Summary
  where
    S: AsRef<str> + Debug + Sync,
  {
    let planned = self.plan(targets).and_then(|order| {
      E::check_run(ctx)?;
      Ok(order)
    });
    let order = match planned {
      Ok(order) => order,
      Err(exception) => {
        error!(error = %exception, "run_aborted");
        self.report(ctx, &exception).await;
        return Summary::aborted(exception);
      }
    };

    info!(
      order = ?order.iter().map(|e| e.id()).collect::<Vec<_>>(),
      "run_started"
    );

    let mut results = Vec::with_capacity(order.len());
    let mut blocked: HashSet<String> = HashSet::new();

    for entity in order {
      let upstream_blocked = entity.needs().iter().any(|need| blocked.contains(need));
      let mut entity_ctx = EntityContext::new(ctx.clone(), entity)
        .with_upstream_blocked(upstream_blocked)
        .with_default_timeout(self.default_timeout);

      drive(&self.pipeline, &mut entity_ctx, cancel).await;

      let status = entity_ctx.result.status;
      let skipped_for_upstream =
        status == Status::Skipped && upstream_blocked && !entity_ctx.data.force;
      if status.blocks_dependents() || skipped_for_upstream {
        blocked.insert(entity_ctx.result.id.clone());
      }
      results.push(entity_ctx.result);
    }

    let summary = Summary::from_results(results);
    info!(
      status = %summary.status,
      entities = summary.results.len(),
      failed = summary.failed().count(),
      "run_completed"
    );
    summary
  }

  /// Publish a run-level failure on the bus.
  async fn report(&self, ctx: &RunContext, exception: &ExecutionError) {
    let payload = match exception {
      ExecutionError::MissingDependencies { entries } => Payload::FoundMissingDependencies {
        entries: entries.clone(),
      },
      ExecutionError::CyclicalReferences { cycles } => Payload::FoundCyclicalReferences {
        cycles: cycles.clone(),
      },
      other => {
        ctx
          .bus()
          .send_async(Message::diagnostic(Severity::Error, other.to_string()))
          .await;
        return;
      }
    };
    ctx.bus().send_async(Message::new(E::KIND, payload)).await;
  }
}

/// Fail on needs that name unregistered ids, then on cycles.
pub(crate) fn check_structure<T: Vertex>(registry: &Registry<T>) -> Result<(), ExecutionError> {
  let missing = detect_missing(registry);
  if !missing.is_empty() {
    return Err(ExecutionError::MissingDependencies { entries: missing });
  }

  let cycles = detect_cycles(registry);
  if !cycles.is_empty() {
    return Err(ExecutionError::CyclicalReferences { cycles });
  }
  Ok(())
}
