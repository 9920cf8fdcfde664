use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bosun_bus::{Message, Payload};
use bosun_context::RunContext;
use bosun_graph::Vertex;
use bosun_pipeline::{ExecutionError, RunResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{Data, Definition, Deployment, Invocation, Job, Phase, Task};

/// A task, job, or deployment as the runners see it.
#[async_trait]
pub trait Entity: Vertex + Send + Sync + Sized + 'static {
  /// Entity kind, used for logging and structural bus topics.
  const KIND: &'static str;

  fn name(&self) -> &str;

  fn definition(&self) -> &Definition;

  /// Topic prefix for progress messages about this entity.
  fn topic(&self) -> &str {
    Self::KIND
  }

  /// The hook task registered for `phase` of this entity, if any.
  fn hook(&self, _phase: Phase) -> Option<&Arc<Task>> {
    None
  }

  /// Structural checks on what this kind runs besides itself, made after
  /// planning and before the first entity starts.
  fn check_run(_run: &RunContext) -> Result<(), ExecutionError> {
    Ok(())
  }

  /// Run the unit of work.
  async fn invoke(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>>;
}

/// The state one entity carries through its pipeline.
pub struct EntityContext<E> {
  pub run: RunContext,
  pub entity: Arc<E>,
  pub data: Data,
  pub result: RunResult,
  /// A dependency failed, was cancelled, or was itself skipped for that reason.
  pub upstream_blocked: bool,
  /// Timeout used when the entity does not declare one.
  pub default_timeout: Option<Duration>,
}

pub type TaskContext = EntityContext<Task>;
pub type JobContext = EntityContext<Job>;
pub type DeploymentContext = EntityContext<Deployment>;

impl<E: Entity> EntityContext<E> {
  pub fn new(run: RunContext, entity: Arc<E>) -> Self {
    let result = RunResult::new(entity.id(), entity.name());
    let data = Data {
      cwd: run.cwd().to_path_buf(),
      condition: true,
      ..Data::default()
    };
    Self {
      run,
      entity,
      data,
      result,
      upstream_blocked: false,
      default_timeout: None,
    }
  }

  pub fn with_upstream_blocked(mut self, blocked: bool) -> Self {
    self.upstream_blocked = blocked;
    self
  }

  pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.default_timeout = timeout;
    self
  }

  /// What the handler gets to see.
  pub fn invocation(&self) -> Invocation {
    Invocation {
      id: self.entity.id().to_string(),
      name: self.entity.name().to_string(),
      run: self.run.clone(),
      data: self.data.clone(),
    }
  }

  /// Publish a progress message under the entity's topic.
  pub async fn emit(&self, payload: Payload) {
    self
      .run
      .bus()
      .send_async(Message::new(self.entity.topic(), payload))
      .await;
  }
}
