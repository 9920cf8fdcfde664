use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::ExecutionError;

type Handler<C> = Arc<
  dyn for<'a> Fn(&'a mut C, &'a CancellationToken) -> BoxFuture<'a, Result<(), ExecutionError>>
    + Send
    + Sync,
>;

fn handler<C, F>(f: F) -> Handler<C>
where
  F: for<'a> Fn(&'a mut C, &'a CancellationToken) -> BoxFuture<'a, Result<(), ExecutionError>>
    + Send
    + Sync
    + 'static,
{
  Arc::new(f)
}

/// One stage wrapped around an entity run.
///
/// A stage may do work before and after calling `next`, or return without
/// calling it to short-circuit the stages after it.
#[async_trait]
pub trait Middleware<C>: Send + Sync {
  fn name(&self) -> &str;

  async fn handle(
    &self,
    ctx: &mut C,
    next: Next<C>,
    cancel: &CancellationToken,
  ) -> Result<(), ExecutionError>;
}

/// The remainder of the pipeline after the current stage.
pub struct Next<C> {
  handler: Handler<C>,
}

impl<C: Send + 'static> Next<C> {
  pub async fn run(self, ctx: &mut C, cancel: &CancellationToken) -> Result<(), ExecutionError> {
    (self.handler)(ctx, cancel).await
  }
}

/// Ordered stages, outermost first, composed into a single handler.
pub struct Pipeline<C> {
  names: Vec<String>,
  handler: Handler<C>,
}

impl<C: Send + 'static> Pipeline<C> {
  pub fn builder() -> PipelineBuilder<C> {
    PipelineBuilder { stages: Vec::new() }
  }

  pub fn new(stages: Vec<Arc<dyn Middleware<C>>>) -> Self {
    let names = stages.iter().map(|s| s.name().to_string()).collect();
    let terminal: Handler<C> = handler(|_ctx, _cancel| Box::pin(async { Ok(()) }));
    let composed = stages.into_iter().rev().fold(terminal, |next: Handler<C>, stage| {
      handler(move |ctx, cancel| {
        let stage = stage.clone();
        let next = Next {
          handler: next.clone(),
        };
        Box::pin(async move { stage.handle(ctx, next, cancel).await })
      })
    });
    Self {
      names,
      handler: composed,
    }
  }

  pub fn stage_names(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  pub async fn run(&self, ctx: &mut C, cancel: &CancellationToken) -> Result<(), ExecutionError> {
    trace!(stages = ?self.names, "pipeline_run");
    (self.handler)(ctx, cancel).await
  }
}

pub struct PipelineBuilder<C> {
  stages: Vec<Arc<dyn Middleware<C>>>,
}

impl<C: Send + 'static> PipelineBuilder<C> {
  /// Append a stage inside the ones already added.
  pub fn stage(mut self, stage: impl Middleware<C> + 'static) -> Self {
    self.stages.push(Arc::new(stage));
    self
  }

  pub fn build(self) -> Pipeline<C> {
    Pipeline::new(self.stages)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Record(&'static str);

  #[async_trait]
  impl Middleware<Vec<String>> for Record {
    fn name(&self) -> &str {
      self.0
    }

    async fn handle(
      &self,
      ctx: &mut Vec<String>,
      next: Next<Vec<String>>,
      cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
      ctx.push(format!("enter {}", self.0));
      next.run(ctx, cancel).await?;
      ctx.push(format!("exit {}", self.0));
      Ok(())
    }
  }

  struct Stop;

  #[async_trait]
  impl Middleware<Vec<String>> for Stop {
    fn name(&self) -> &str {
      "stop"
    }

    async fn handle(
      &self,
      ctx: &mut Vec<String>,
      _next: Next<Vec<String>>,
      _cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
      ctx.push("stop".to_string());
      Ok(())
    }
  }

  struct Fail;

  #[async_trait]
  impl Middleware<Vec<String>> for Fail {
    fn name(&self) -> &str {
      "fail"
    }

    async fn handle(
      &self,
      _ctx: &mut Vec<String>,
      _next: Next<Vec<String>>,
      _cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
      Err(ExecutionError::handler("nope"))
    }
  }

  #[tokio::test]
  async fn test_stages_nest_in_order() {
    let pipeline = Pipeline::builder()
      .stage(Record("outer"))
      .stage(Record("inner"))
      .build();
    assert_eq!(pipeline.stage_names().collect::<Vec<_>>(), vec!["outer", "inner"]);

    let mut log = Vec::new();
    pipeline.run(&mut log, &CancellationToken::new()).await.unwrap();
    assert_eq!(log, vec!["enter outer", "enter inner", "exit inner", "exit outer"]);
  }

  #[tokio::test]
  async fn test_pipeline_is_reusable() {
    let pipeline = Pipeline::builder().stage(Record("only")).build();
    for _ in 0..2 {
      let mut log = Vec::new();
      pipeline.run(&mut log, &CancellationToken::new()).await.unwrap();
      assert_eq!(log.len(), 2);
    }
  }

  #[tokio::test]
  async fn test_stage_can_short_circuit() {
    let pipeline = Pipeline::builder()
      .stage(Record("outer"))
      .stage(Stop)
      .stage(Record("never"))
      .build();

    let mut log = Vec::new();
    pipeline.run(&mut log, &CancellationToken::new()).await.unwrap();
    assert_eq!(log, vec!["enter outer", "stop", "exit outer"]);
  }

  #[tokio::test]
  async fn test_error_unwinds_outer_stages() {
    let pipeline = Pipeline::builder().stage(Record("outer")).stage(Fail).build();

    let mut log = Vec::new();
    let err = pipeline
      .run(&mut log, &CancellationToken::new())
      .await
      .unwrap_err();
    assert_eq!(err, ExecutionError::handler("nope"));
    assert_eq!(log, vec!["enter outer"]);
  }

  #[tokio::test]
  async fn test_empty_pipeline_succeeds() {
    let pipeline: Pipeline<Vec<String>> = Pipeline::new(Vec::new());
    let mut log = Vec::new();
    pipeline.run(&mut log, &CancellationToken::new()).await.unwrap();
    assert!(log.is_empty());
  }
}
