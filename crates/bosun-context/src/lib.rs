//! Bosun Context
//!
//! Everything an entity run reads from its surroundings:
//!
//! - [`Variables`] - case-insensitive environment and secret maps
//! - [`Services`] - a type-keyed service locator
//! - [`RunContext`] - the per-run handle tying those together with the bus,
//!   the working directory, and the caller's cancellation token
//! - [`Deferred`] - configuration resolved lazily against a run context

mod context;
mod deferred;
mod error;
mod services;
mod variables;

pub use context::{Changes, Fork, RunContext};
pub use deferred::{Deferred, Source};
pub use error::ResolveError;
pub use services::Services;
pub use variables::Variables;
