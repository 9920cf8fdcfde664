//! Bosun Graph
//!
//! Dependency bookkeeping for bosun entities. Tasks, jobs and deployments all
//! reduce to a [`Node`] (an id plus the ids it needs); the algorithms in this
//! crate only ever see nodes, never the payload around them.
//!
//! - [`Registry`] stores entities by id in insertion order
//! - [`detect_missing`] reports needs that name unregistered ids
//! - [`detect_cycles`] reports every cycle in the needs graph
//! - [`compute_order`] yields a dependency-first run order for a target set

mod error;
mod graph;
mod node;
mod registry;

pub use error::GraphError;
pub use graph::{Cycle, MissingDependency, compute_order, detect_cycles, detect_missing};
pub use node::{Node, Vertex};
pub use registry::Registry;
