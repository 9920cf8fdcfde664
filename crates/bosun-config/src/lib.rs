//! Bosun Config
//!
//! Serializable definitions of tasks, jobs, and deployments as they appear in
//! a runfile (`bosun.json`), before they are resolved into engine entities.
//! Also parses `KEY=VALUE` env files for `--env-file` and `--secret-file`.

mod entity;
mod env_file;
mod error;
mod runfile;

pub use entity::{DeploymentDef, EntityDef, JobDef, TaskDef};
pub use env_file::{load_env_file, parse_env_file};
pub use error::ConfigError;
pub use runfile::{DEFAULT_RUNFILE, RunfileDef};
