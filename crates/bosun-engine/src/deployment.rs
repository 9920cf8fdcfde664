use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bosun_graph::{Node, Vertex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{Definition, Entity, Handler, Invocation, Task};

/// What a deployment run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Deploy,
  Rollback,
  Destroy,
}

impl Action {
  pub const ALL: [Action; 3] = [Action::Deploy, Action::Rollback, Action::Destroy];

  pub fn as_str(self) -> &'static str {
    match self {
      Action::Deploy => "deploy",
      Action::Rollback => "rollback",
      Action::Destroy => "destroy",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Action {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "deploy" => Ok(Action::Deploy),
      "rollback" => Ok(Action::Rollback),
      "destroy" => Ok(Action::Destroy),
      other => Err(format!("unknown action '{}'", other)),
    }
  }
}

/// When a hook runs relative to the main handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
  Before,
  After,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Before => "before",
      Phase::After => "after",
    })
  }
}

/// Hook tasks keyed by `<phase>:<action>` (`before:deploy`, `after:destroy`).
#[derive(Debug, Clone, Default)]
pub struct Hooks {
  tasks: BTreeMap<String, Arc<Task>>,
}

impl Hooks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn key(phase: Phase, action: Action) -> String {
    format!("{}:{}", phase, action)
  }

  pub fn insert(&mut self, phase: Phase, action: Action, task: Task) -> Option<Arc<Task>> {
    self.tasks.insert(Self::key(phase, action), Arc::new(task))
  }

  pub fn get(&self, phase: Phase, action: Action) -> Option<&Arc<Task>> {
    self.tasks.get(&Self::key(phase, action))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Task>)> {
    self.tasks.iter().map(|(k, t)| (k.as_str(), t))
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

/// Something that can be deployed, rolled back, and destroyed.
///
/// A deployment is registered once and then viewed through
/// [`with_action`](Deployment::with_action) for the action being run.
#[derive(Clone)]
pub struct Deployment {
  node: Node,
  name: String,
  action: Action,
  definition: Definition,
  handlers: HashMap<Action, Arc<dyn Handler>>,
  hooks: Hooks,
}

impl Deployment {
  pub fn new(id: impl Into<String>) -> Self {
    let node = Node::new(id);
    Self {
      name: node.id.clone(),
      node,
      action: Action::Deploy,
      definition: Definition::default(),
      handlers: HashMap::new(),
      hooks: Hooks::new(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_needs<I, S>(mut self, needs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.node = self.node.with_needs(needs);
    self
  }

  pub fn with_definition(mut self, definition: Definition) -> Self {
    self.definition = definition;
    self
  }

  /// Set the handler for one action.
  pub fn on(mut self, action: Action, handler: Arc<dyn Handler>) -> Self {
    self.handlers.insert(action, handler);
    self
  }

  pub fn with_hook(mut self, phase: Phase, action: Action, task: Task) -> Self {
    self.hooks.insert(phase, action, task);
    self
  }

  /// The same deployment, run for another action.
  pub fn with_action(&self, action: Action) -> Self {
    Self {
      action,
      ..self.clone()
    }
  }

  pub fn action(&self) -> Action {
    self.action
  }

  pub fn hooks(&self) -> &Hooks {
    &self.hooks
  }

  pub fn handles(&self, action: Action) -> bool {
    self.handlers.contains_key(&action)
  }
}

impl Vertex for Deployment {
  fn node(&self) -> &Node {
    &self.node
  }
}

#[async_trait]
impl Entity for Deployment {
  const KIND: &'static str = "deployment";

  fn name(&self) -> &str {
    &self.name
  }

  fn definition(&self) -> &Definition {
    &self.definition
  }

  fn topic(&self) -> &str {
    self.action.as_str()
  }

  fn hook(&self, phase: Phase) -> Option<&Arc<Task>> {
    self.hooks.get(phase, self.action)
  }

  async fn invoke(
    &self,
    invocation: Invocation,
    cancel: CancellationToken,
  ) -> anyhow::Result<Option<Value>> {
    let handler = self.handlers.get(&self.action).ok_or_else(|| {
      anyhow::anyhow!(
        "deployment '{}' has no {} handler",
        self.node.id,
        self.action
      )
    })?;
    handler.call(invocation, cancel).await
  }
}

impl fmt::Debug for Deployment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Deployment")
      .field("id", &self.node.id)
      .field("name", &self.name)
      .field("action", &self.action)
      .field("needs", &self.node.needs)
      .field("hooks", &self.hooks)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::handler_fn;

  fn noop() -> Arc<dyn Handler> {
    handler_fn(|_, _| async { anyhow::Ok(None::<Value>) })
  }

  #[test]
  fn test_action_round_trips_through_str() {
    for action in Action::ALL {
      assert_eq!(action.as_str().parse::<Action>(), Ok(action));
    }
    assert!("upgrade".parse::<Action>().is_err());
  }

  #[test]
  fn test_hooks_follow_action() {
    let deployment = Deployment::new("web")
      .on(Action::Deploy, noop())
      .with_hook(Phase::Before, Action::Deploy, Task::new("migrate", noop()))
      .with_hook(Phase::After, Action::Destroy, Task::new("cleanup", noop()));

    assert_eq!(deployment.topic(), "deploy");
    assert_eq!(
      deployment.hook(Phase::Before).map(|t| t.id()),
      Some("migrate")
    );
    assert!(deployment.hook(Phase::After).is_none());

    let destroy = deployment.with_action(Action::Destroy);
    assert_eq!(destroy.topic(), "destroy");
    assert!(destroy.hook(Phase::Before).is_none());
    assert_eq!(destroy.hook(Phase::After).map(|t| t.id()), Some("cleanup"));
    assert!(!destroy.handles(Action::Destroy));
    assert_eq!(destroy.hooks().len(), 2);
  }
}
