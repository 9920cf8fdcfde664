use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DeploymentDef, JobDef, TaskDef};

/// Runfile looked up in the working directory when none is given.
pub const DEFAULT_RUNFILE: &str = "bosun.json";

/// Everything a runfile declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunfileDef {
  #[serde(default)]
  pub tasks: Vec<TaskDef>,
  #[serde(default)]
  pub jobs: Vec<JobDef>,
  #[serde(default)]
  pub deployments: Vec<DeploymentDef>,
}

impl RunfileDef {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}
