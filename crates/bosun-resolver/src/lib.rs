//! Bosun Resolver
//!
//! Turns a [`RunfileDef`](bosun_config::RunfileDef) into engine entities.
//! Task, action, and hook bodies become shell scripts; every string field is a
//! minijinja template rendered against the run environment when the entity
//! runs.

mod error;
mod resolver;
mod shell;
mod template;

pub use error::ResolverError;
pub use resolver::{Registries, resolve};
pub use shell::{apply_directives, shell_handler};
pub use template::{TemplateContext, is_truthy, render};
