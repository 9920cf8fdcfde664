//! Bosun Pipeline
//!
//! The machinery every entity run goes through:
//!
//! - [`Middleware`] - one stage around an entity run, deciding if and when to
//!   call the rest of the pipeline through [`Next`]
//! - [`Pipeline`] - an ordered list of stages, composed once at construction
//! - [`Status`], [`RunResult`], [`Summary`] - per-entity and per-run outcomes
//! - [`ExecutionError`] - the typed error stored in those outcomes

mod error;
mod pipeline;
mod result;
mod status;

pub use error::ExecutionError;
pub use pipeline::{Middleware, Next, Pipeline, PipelineBuilder};
pub use result::{RunResult, Summary};
pub use status::Status;
