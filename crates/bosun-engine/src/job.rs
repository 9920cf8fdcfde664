use std::sync::Arc;

use async_trait::async_trait;
use bosun_context::RunContext;
use bosun_graph::{Node, Registry, Vertex};
use bosun_pipeline::{ExecutionError, Status};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::orchestrator::check_structure;
use crate::{Definition, Entity, Invocation, Task, TaskRunner};

/// An ordered group of tasks.
///
/// The job body runs its tasks (and whatever they need) through a nested
/// [`TaskRunner`] against the same run context. The task registry is looked
/// up in the run's services as `Registry<Arc<Task>>`.
#[derive(Debug, Clone)]
pub struct Job {
  node: Node,
  name: String,
  definition: Definition,
  tasks: Vec<String>,
}

impl Job {
  pub fn new<I, S>(id: impl Into<String>, tasks: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let node = Node::new(id);
    Self {
      name: node.id.clone(),
      node,
      definition: Definition::default(),
      tasks: tasks.into_iter().map(Into::into).collect(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_needs<I, S>(mut self, needs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.node = self.node.with_needs(needs);
    self
  }

  pub fn with_definition(mut self, definition: Definition) -> Self {
    self.definition = definition;
    self
  }

  pub fn tasks(&self) -> &[String] {
    &self.tasks
  }
}

impl Vertex for Job {
  fn node(&self) -> &Node {
    &self.node
  }
}

#[async_trait]
impl Entity for Job {
  const KIND: &'static str = "job";

  fn name(&self) -> &str {
    &self.name
  }

  fn definition(&self) -> &Definition {
    &self.definition
  }

  /// Missing and cyclical task needs abort a job run before any job starts.
  fn check_run(run: &RunContext) -> Result<(), ExecutionError> {
    match run.services().get::<Registry<Arc<Task>>>() {
      Some(tasks) => check_structure(&*tasks),
      None => Ok(()),
    }
  }

  async fn invoke(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>> {
    // Grouping only
    if self.tasks.is_empty() {
      return Ok(Some(json!({ "tasks": [], "succeeded": 0 })));
    }

    let registry = invocation
      .run
      .services()
      .get::<Registry<Arc<Task>>>()
      .ok_or_else(|| anyhow::anyhow!("no task registry available to job '{}'", self.node.id))?;

    debug!(job_id = %self.node.id, tasks = ?self.tasks, "job_tasks_started");

    let runner = TaskRunner::new(registry).with_default_timeout(invocation.data.timeout);
    let summary = runner
      .run_with_token(&invocation.run, &self.tasks, &cancel)
      .await;

    if let Some(exception) = &summary.exception {
      return Err(exception.clone().into());
    }

    let failed: Vec<&str> = summary.failed().map(|r| r.id.as_str()).collect();
    if !failed.is_empty() {
      anyhow::bail!(
        "{} of {} tasks failed: {}",
        failed.len(),
        summary.results.len(),
        failed.join(", ")
      );
    }
    if summary.has_cancellations() {
      return Err(ExecutionError::Cancelled.into());
    }

    let results: Vec<Value> = summary
      .results
      .iter()
      .map(|r| json!({ "id": r.id, "status": r.status }))
      .collect();
    let ran = summary
      .results
      .iter()
      .filter(|r| r.status == Status::Success)
      .count();
    Ok(Some(json!({ "tasks": results, "succeeded": ran })))
  }
}
