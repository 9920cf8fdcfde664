use std::collections::HashMap;

use crate::error::GraphError;
use crate::node::Vertex;

/// Entities keyed by id, iterated in the order they were added.
///
/// Entries are never replaced or removed; once wiring is done the registry is
/// read-only and can be shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Registry<T> {
  entries: Vec<T>,
  index: HashMap<String, usize>,
}

impl<T: Vertex> Registry<T> {
  pub fn new() -> Self {
    Self {
      entries: Vec::new(),
      index: HashMap::new(),
    }
  }

  /// Add an entity. Ids are unique within a registry.
  pub fn add(&mut self, entity: T) -> Result<(), GraphError> {
    let id = entity.id().to_string();
    if self.index.contains_key(&id) {
      return Err(GraphError::DuplicateId(id));
    }
    self.index.insert(id, self.entries.len());
    self.entries.push(entity);
    Ok(())
  }

  pub fn get(&self, id: &str) -> Option<&T> {
    self.index.get(id).map(|&i| &self.entries[i])
  }

  pub fn contains(&self, id: &str) -> bool {
    self.index.contains_key(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.entries.iter()
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|e| e.id())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<T: Vertex> Default for Registry<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Vertex> TryFrom<Vec<T>> for Registry<T> {
  type Error = GraphError;

  fn try_from(entities: Vec<T>) -> Result<Self, Self::Error> {
    let mut registry = Self::new();
    for entity in entities {
      registry.add(entity)?;
    }
    Ok(registry)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::Node;

  #[test]
  fn test_add_and_lookup() {
    let mut registry = Registry::new();
    registry.add(Node::new("build")).unwrap();
    registry
      .add(Node::new("test").with_needs(["build"]))
      .unwrap();

    assert!(registry.contains("build"));
    assert!(!registry.contains("deploy"));
    assert_eq!(registry.get("test").unwrap().needs, vec!["build"]);
    assert_eq!(registry.len(), 2);
  }

  #[test]
  fn test_duplicate_id_rejected() {
    let mut registry = Registry::new();
    registry.add(Node::new("build")).unwrap();
    let err = registry.add(Node::new("build")).unwrap_err();
    assert_eq!(err, GraphError::DuplicateId("build".to_string()));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_iteration_preserves_insertion_order() {
    let registry =
      Registry::try_from(vec![Node::new("c"), Node::new("a"), Node::new("b")]).unwrap();
    let ids: Vec<&str> = registry.ids().collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
  }
}
