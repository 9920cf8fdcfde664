use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields shared by tasks, jobs, and deployments.
///
/// String fields are templates rendered against the run environment when the
/// entity runs (`"{{ env.TARGET_DIR }}"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub needs: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_secs: Option<u64>,
  #[serde(default)]
  pub force: bool,
  /// Run only when this renders to something truthy.
  #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub inputs: Map<String, Value>,
}

/// A shell task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  #[serde(flatten)]
  pub entity: EntityDef,
  /// Script run through the platform shell.
  pub run: String,
}

/// A group of tasks run together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDef {
  #[serde(flatten)]
  pub entity: EntityDef,
  pub tasks: Vec<String>,
}

/// Scripts for each deployment action, plus hook scripts keyed by
/// `<before|after>:<action>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDef {
  #[serde(flatten)]
  pub entity: EntityDef,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deploy: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rollback: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub destroy: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub hooks: BTreeMap<String, String>,
}
