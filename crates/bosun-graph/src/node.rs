use serde::{Deserialize, Serialize};

/// The graph-facing part of an entity: its id and the ids it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub needs: Vec<String>,
}

impl Node {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      needs: Vec::new(),
    }
  }

  /// Add dependencies, skipping ids already present.
  pub fn with_needs<I, S>(mut self, needs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for need in needs {
      let need = need.into();
      if !self.needs.contains(&need) {
        self.needs.push(need);
      }
    }
    self
  }
}

/// Anything that can be placed in a [`Registry`](crate::Registry).
pub trait Vertex {
  fn node(&self) -> &Node;

  fn id(&self) -> &str {
    &self.node().id
  }

  fn needs(&self) -> &[String] {
    &self.node().needs
  }
}

impl Vertex for Node {
  fn node(&self) -> &Node {
    self
  }
}

impl<T: Vertex + ?Sized> Vertex for std::sync::Arc<T> {
  fn node(&self) -> &Node {
    (**self).node()
  }
}
