//! Graph algorithms over the needs edges of a [`Registry`].
//!
//! An edge runs from an entity to each id it needs. All traversals start from
//! registry entries in insertion order and follow needs in declaration order,
//! so results are deterministic for a given registry.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::node::Vertex;
use crate::registry::Registry;

/// An entity whose needs name ids that are not registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
  pub id: String,
  pub missing: Vec<String>,
}

/// Ids on one cycle, in traversal order: each id needs the next, and the last
/// needs the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
  pub ids: Vec<String>,
}

impl Cycle {
  pub fn contains(&self, id: &str) -> bool {
    self.ids.iter().any(|i| i == id)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
  White,
  Gray,
  Black,
}

/// Report every entity that needs an id absent from the registry.
///
/// Entities whose needs all resolve are left out, so an empty result means the
/// registry is closed under its needs.
pub fn detect_missing<T: Vertex>(registry: &Registry<T>) -> Vec<MissingDependency> {
  registry
    .iter()
    .filter_map(|entity| {
      let missing: Vec<String> = entity
        .needs()
        .iter()
        .filter(|need| !registry.contains(need))
        .cloned()
        .collect();

      (!missing.is_empty()).then(|| MissingDependency {
        id: entity.id().to_string(),
        missing,
      })
    })
    .collect()
}

/// Find the cycles in the needs graph with a white/gray/black depth-first
/// search.
///
/// Every back edge (a need that points at a gray node, i.e. one still on the
/// current path) closes a cycle made of the path from that node to the top.
/// The search restarts from every white node, so disjoint cycles are all
/// reported. Cycles with the same members are reported once. Needs that name
/// unregistered ids are ignored here; see [`detect_missing`].
pub fn detect_cycles<T: Vertex>(registry: &Registry<T>) -> Vec<Cycle> {
  fn visit<'a, T: Vertex>(
    id: &'a str,
    registry: &'a Registry<T>,
    color: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
    found: &mut Vec<Vec<&'a str>>,
  ) {
    color.insert(id, Color::Gray);
    path.push(id);

    if let Some(entity) = registry.get(id) {
      for need in entity.needs() {
        match color.get(need.as_str()) {
          Some(Color::White) => visit(need.as_str(), registry, color, path, found),
          Some(Color::Gray) => {
            if let Some(start) = path.iter().rposition(|p| *p == need.as_str()) {
              found.push(path[start..].to_vec());
            }
          }
          // Black (already finished) or not registered
          _ => {}
        }
      }
    }

    path.pop();
    color.insert(id, Color::Black);
  }

  let mut color: HashMap<&str, Color> = registry.ids().map(|id| (id, Color::White)).collect();
  let mut path = Vec::new();
  let mut found = Vec::new();

  for id in registry.ids() {
    if color.get(id) == Some(&Color::White) {
      visit(id, registry, &mut color, &mut path, &mut found);
    }
  }

  let mut seen: HashSet<Vec<&str>> = HashSet::new();
  found
    .into_iter()
    .filter(|ids| {
      let mut key = ids.clone();
      key.sort_unstable();
      seen.insert(key)
    })
    .map(|ids| Cycle {
      ids: ids.into_iter().map(str::to_string).collect(),
    })
    .collect()
}

/// Compute the run order for `targets` and everything they transitively need.
///
/// Depth-first post-order from each target in turn: an entity is emitted after
/// all of its needs, and only the first visit counts. Needs absent from the
/// registry are skipped. A need already on the current path is not re-entered,
/// which keeps the walk finite on cyclic input; callers are expected to reject
/// cycles with [`detect_cycles`] first.
pub fn compute_order<'a, T, S>(
  registry: &'a Registry<T>,
  targets: &[S],
) -> Result<Vec<&'a T>, GraphError>
where
  T: Vertex,
  S: AsRef<str>,
{
  fn visit<'a, T: Vertex>(
    id: &str,
    registry: &'a Registry<T>,
    visited: &mut HashSet<&'a str>,
    on_path: &mut HashSet<&'a str>,
    order: &mut Vec<&'a T>,
  ) {
    let Some(entity) = registry.get(id) else {
      return;
    };
    let id = entity.id();
    if visited.contains(id) || on_path.contains(id) {
      return;
    }

    on_path.insert(id);
    for need in entity.needs() {
      visit(need, registry, visited, on_path, order);
    }
    on_path.remove(id);

    visited.insert(id);
    order.push(entity);
  }

  if let Some(unknown) = targets.iter().find(|t| !registry.contains(t.as_ref())) {
    return Err(GraphError::UnknownTarget(unknown.as_ref().to_string()));
  }

  let mut visited = HashSet::new();
  let mut on_path = HashSet::new();
  let mut order = Vec::new();

  for target in targets {
    visit(
      target.as_ref(),
      registry,
      &mut visited,
      &mut on_path,
      &mut order,
    );
  }

  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::Node;

  fn registry(nodes: &[(&str, &[&str])]) -> Registry<Node> {
    let mut registry = Registry::new();
    for (id, needs) in nodes {
      registry
        .add(Node::new(*id).with_needs(needs.iter().copied()))
        .unwrap();
    }
    registry
  }

  fn ids<T: Vertex>(order: &[&T]) -> Vec<String> {
    order.iter().map(|e| e.id().to_string()).collect()
  }

  #[test]
  fn test_detect_missing_reports_only_unresolved() {
    let registry = registry(&[
      ("build", &[]),
      ("test", &["build", "lint"]),
      ("deploy", &["test", "package", "lint"]),
    ]);

    let missing = detect_missing(&registry);
    assert_eq!(
      missing,
      vec![
        MissingDependency {
          id: "test".to_string(),
          missing: vec!["lint".to_string()],
        },
        MissingDependency {
          id: "deploy".to_string(),
          missing: vec!["package".to_string(), "lint".to_string()],
        },
      ]
    );
  }

  #[test]
  fn test_detect_missing_empty_when_closed() {
    let registry = registry(&[("a", &[]), ("b", &["a"])]);
    assert!(detect_missing(&registry).is_empty());
  }

  #[test]
  fn test_detect_cycles_none_for_dag() {
    let registry = registry(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
    assert!(detect_cycles(&registry).is_empty());
  }

  #[test]
  fn test_detect_cycles_self_need() {
    let registry = registry(&[("a", &["a"])]);
    let cycles = detect_cycles(&registry);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].ids, vec!["a"]);
  }

  #[test]
  fn test_detect_cycles_finds_disjoint_cycles() {
    let registry = registry(&[
      ("a", &["b"]),
      ("b", &["a"]),
      ("ok", &[]),
      ("x", &["y"]),
      ("y", &["z"]),
      ("z", &["x"]),
    ]);

    let cycles = detect_cycles(&registry);
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].ids, vec!["a", "b"]);
    assert_eq!(cycles[1].ids, vec!["x", "y", "z"]);
    assert!(!cycles.iter().any(|c| c.contains("ok")));
  }

  #[test]
  fn test_detect_cycles_ignores_missing_needs() {
    let registry = registry(&[("a", &["ghost"])]);
    assert!(detect_cycles(&registry).is_empty());
  }

  #[test]
  fn test_compute_order_dependencies_first() {
    let registry = registry(&[
      ("deploy", &["test", "package"]),
      ("package", &["build"]),
      ("test", &["build"]),
      ("build", &[]),
    ]);

    let order = compute_order(&registry, &["deploy"]).unwrap();
    assert_eq!(ids(&order), vec!["build", "test", "package", "deploy"]);
  }

  #[test]
  fn test_compute_order_deduplicates_across_targets() {
    let registry = registry(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);

    let order = compute_order(&registry, &["b", "c", "b"]).unwrap();
    assert_eq!(ids(&order), vec!["a", "b", "c"]);
  }

  #[test]
  fn test_compute_order_only_includes_closure() {
    let registry = registry(&[("a", &[]), ("b", &["a"]), ("unrelated", &[])]);

    let order = compute_order(&registry, &["b"]).unwrap();
    assert_eq!(ids(&order), vec!["a", "b"]);
  }

  #[test]
  fn test_compute_order_skips_missing_needs() {
    let registry = registry(&[("a", &["ghost"])]);
    let order = compute_order(&registry, &["a"]).unwrap();
    assert_eq!(ids(&order), vec!["a"]);
  }

  #[test]
  fn test_compute_order_unknown_target() {
    let registry = registry(&[("a", &[])]);
    let err = compute_order(&registry, &["nope"]).unwrap_err();
    assert_eq!(err, GraphError::UnknownTarget("nope".to_string()));
  }

  #[test]
  fn test_compute_order_terminates_on_cycle() {
    let registry = registry(&[("a", &["b"]), ("b", &["a"])]);
    let order = compute_order(&registry, &["a"]).unwrap();
    assert_eq!(ids(&order), vec!["b", "a"]);
  }
}
