use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bosun_graph::{Node, Vertex};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{Definition, Entity, Handler, Invocation};

/// A single unit of work.
#[derive(Clone)]
pub struct Task {
  node: Node,
  name: String,
  definition: Definition,
  handler: Arc<dyn Handler>,
}

impl Task {
  pub fn new(id: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
    let node = Node::new(id);
    Self {
      name: node.id.clone(),
      node,
      definition: Definition::default(),
      handler,
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
}

impl Vertex for Task {
  fn node(&self) -> &Node {
    &self.node
  }
}

#[async_trait]
impl Entity for Task {
  const KIND: &'static str = "task";

  fn name(&self) -> &str {
    &self.name
  }

  fn definition(&self) -> &Definition {
    &self.definition
  }

  async fn invoke(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>> {
    self.handler.call(invocation, cancel).await
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("id", &self.node.id)
      .field("name", &self.name)
      .field("needs", &self.node.needs)
      .finish()
  }
}
