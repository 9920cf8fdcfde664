use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bosun_config::{DeploymentDef, EntityDef, JobDef, RunfileDef, TaskDef};
use bosun_context::{Deferred, Services, Variables};
use bosun_engine::{Action, Definition, Deployment, Job, Phase, Task};
use bosun_graph::{Registry, Vertex};
use tracing::{debug, info};

use crate::ResolverError;
use crate::shell::shell_handler;
use crate::template::{TemplateContext, is_truthy, render, validate};

/// Everything a runfile declares, ready to hand to the runners.
#[derive(Debug, Clone, Default)]
pub struct Registries {
  pub tasks: Registry<Arc<Task>>,
  pub jobs: Registry<Arc<Job>>,
  /// Deployments set up for [`Action::Deploy`]; see [`Registries::deployments_for`].
  pub deployments: Registry<Arc<Deployment>>,
}

impl Registries {
  /// The deployments as they run for `action`.
  pub fn deployments_for(&self, action: Action) -> Registry<Arc<Deployment>> {
    let mut registry = Registry::new();
    for deployment in self.deployments.iter() {
      // Ids were unique when the source registry was built.
      let _ = registry.add(Arc::new(deployment.with_action(action)));
    }
    registry
  }

  /// Make the task registry available to jobs.
  pub fn install(&self, services: &Services) {
    services.insert(Arc::new(self.tasks.clone()));
  }
}

/// Build entities from a runfile.
///
/// Checks id uniqueness per kind, job task references, hook keys, and template
/// syntax. Needs are not checked here; the runners report missing and cyclical
/// needs when a run starts.
pub fn resolve(def: RunfileDef) -> Result<Registries, ResolverError> {
  let mut registries = Registries::default();

  for task in def.tasks {
    let task = resolve_task(task)?;
    add(&mut registries.tasks, "task", task)?;
  }

  for job in def.jobs {
    let job = resolve_job(job, &registries.tasks)?;
    add(&mut registries.jobs, "job", job)?;
  }

  for deployment in def.deployments {
    let deployment = resolve_deployment(deployment)?;
    add(&mut registries.deployments, "deployment", deployment)?;
  }

  info!(
    tasks = registries.tasks.len(),
    jobs = registries.jobs.len(),
    deployments = registries.deployments.len(),
    "runfile_resolved"
  );
  Ok(registries)
}

fn add<T: Vertex>(
  registry: &mut Registry<Arc<T>>,
  kind: &'static str,
  entity: T,
) -> Result<(), ResolverError> {
  let id = entity.id().to_string();
  registry
    .add(Arc::new(entity))
    .map_err(|_| ResolverError::DuplicateId { kind, id })
}

fn resolve_task(def: TaskDef) -> Result<Task, ResolverError> {
  check_template(&def.entity.id, "run", &def.run)?;
  let definition = definition(&def.entity)?;
  debug!(task_id = %def.entity.id, "task_resolved");

  Ok(
    Task::new(def.entity.id.clone(), shell_handler(def.run))
      .with_name(display_name(&def.entity))
      .with_needs(def.entity.needs.clone())
      .with_definition(definition),
  )
}

fn resolve_job(def: JobDef, tasks: &Registry<Arc<Task>>) -> Result<Job, ResolverError> {
  if let Some(task) = def.tasks.iter().find(|t| !tasks.contains(t)) {
    return Err(ResolverError::UnknownTask {
      job: def.entity.id.clone(),
      task: task.clone(),
    });
  }
  let definition = definition(&def.entity)?;

  Ok(
    Job::new(def.entity.id.clone(), def.tasks)
      .with_name(display_name(&def.entity))
      .with_needs(def.entity.needs.clone())
      .with_definition(definition),
  )
}

fn resolve_deployment(def: DeploymentDef) -> Result<Deployment, ResolverError> {
  let id = def.entity.id.clone();
  let definition = definition(&def.entity)?;

  let mut deployment = Deployment::new(id.clone())
    .with_name(display_name(&def.entity))
    .with_needs(def.entity.needs.clone())
    .with_definition(definition.clone());

  let scripts = [
    (Action::Deploy, def.deploy),
    (Action::Rollback, def.rollback),
    (Action::Destroy, def.destroy),
  ];
  for (action, script) in scripts {
    if let Some(script) = script {
      check_template(&id, action.as_str(), &script)?;
      deployment = deployment.on(action, shell_handler(script));
    }
  }

  // Hooks share the deployment's cwd, env, and timeout but are never gated.
  let hook_definition = Definition {
    force: Deferred::value(false),
    condition: Deferred::value(true),
    ..definition
  };
  for (key, script) in def.hooks {
    let (phase, action) = parse_hook_key(&key).ok_or_else(|| ResolverError::InvalidHook {
      deployment: id.clone(),
      key: key.clone(),
    })?;
    check_template(&id, &key, &script)?;
    let hook = Task::new(format!("{}:{}", id, key), shell_handler(script))
      .with_definition(hook_definition.clone());
    deployment = deployment.with_hook(phase, action, hook);
  }

  Ok(deployment)
}

fn parse_hook_key(key: &str) -> Option<(Phase, Action)> {
  let (phase, action) = key.split_once(':')?;
  let phase = match phase {
    "before" => Phase::Before,
    "after" => Phase::After,
    _ => return None,
  };
  Some((phase, action.parse().ok()?))
}

fn display_name(def: &EntityDef) -> String {
  def.name.clone().unwrap_or_else(|| def.id.clone())
}

fn check_template(id: &str, field: &str, template: &str) -> Result<(), ResolverError> {
  validate(template).map_err(|e| ResolverError::Template {
    id: id.to_string(),
    field: field.to_string(),
    message: e.to_string(),
  })
}

/// Turn the shared fields into deferred values rendered at run time.
fn definition(def: &EntityDef) -> Result<Definition, ResolverError> {
  let mut definition = Definition::default()
    .with_force(Deferred::value(def.force))
    .with_timeout(Deferred::value(def.timeout_secs.map(Duration::from_secs)))
    .with_inputs(Deferred::value(def.inputs.clone()));

  if let Some(cwd) = &def.cwd {
    check_template(&def.id, "cwd", cwd)?;
    let cwd = cwd.clone();
    definition = definition.with_cwd(Deferred::with_context(move |run| {
      let rendered = render(&cwd, &TemplateContext::from_run(run))?;
      Ok(Some(PathBuf::from(rendered)))
    }));
  }

  if let Some(condition) = &def.condition {
    check_template(&def.id, "if", condition)?;
    let condition = condition.clone();
    definition = definition.with_condition(Deferred::with_context(move |run| {
      let rendered = render(&condition, &TemplateContext::from_run(run))?;
      Ok(is_truthy(&rendered))
    }));
  }

  if !def.env.is_empty() {
    for (key, value) in &def.env {
      check_template(&def.id, &format!("env.{}", key), value)?;
    }
    let overlay = def.env.clone();
    definition = definition.with_env(Deferred::with_context(move |run| {
      let context = TemplateContext::from_run(run);
      let mut env = Variables::new();
      for (key, value) in &overlay {
        env.insert(key.clone(), render(value, &context)?);
      }
      Ok(env)
    }));
  }

  Ok(definition)
}

#[cfg(test)]
mod tests {
  use super::*;
  use bosun_engine::Entity;

  fn runfile(json: &str) -> RunfileDef {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn test_resolve_all_kinds() {
    let registries = resolve(runfile(
      r#"{
        "tasks": [
          { "id": "fmt", "run": "cargo fmt --check" },
          { "id": "build", "name": "Build", "needs": ["fmt"], "run": "cargo build" }
        ],
        "jobs": [{ "id": "ci", "tasks": ["build"] }],
        "deployments": [{
          "id": "web",
          "deploy": "./deploy.sh",
          "hooks": { "before:deploy": "./migrate.sh", "after:rollback": "./notify.sh" }
        }]
      }"#,
    ))
    .unwrap();

    assert_eq!(registries.tasks.ids().collect::<Vec<_>>(), vec!["fmt", "build"]);
    let build = registries.tasks.get("build").unwrap();
    assert_eq!(build.name(), "Build");
    assert_eq!(build.needs(), ["fmt"]);

    assert_eq!(registries.jobs.get("ci").unwrap().tasks(), ["build"]);

    let web = registries.deployments.get("web").unwrap();
    assert!(web.handles(Action::Deploy));
    assert!(!web.handles(Action::Rollback));
    assert_eq!(web.hooks().len(), 2);

    let rollback = registries.deployments_for(Action::Rollback);
    assert_eq!(rollback.get("web").unwrap().action(), Action::Rollback);
  }

  #[test]
  fn test_duplicate_ids() {
    let err = resolve(runfile(
      r#"{ "tasks": [{ "id": "a", "run": "true" }, { "id": "a", "run": "false" }] }"#,
    ))
    .unwrap_err();
    assert_eq!(
      err,
      ResolverError::DuplicateId {
        kind: "task",
        id: "a".to_string()
      }
    );
  }

  #[test]
  fn test_job_with_unknown_task() {
    let err = resolve(runfile(
      r#"{ "tasks": [{ "id": "build", "run": "true" }], "jobs": [{ "id": "ci", "tasks": ["bulid"] }] }"#,
    ))
    .unwrap_err();
    assert_eq!(err.to_string(), "job 'ci' lists unknown task 'bulid'");
  }

  #[test]
  fn test_invalid_hook_key() {
    for key in ["during:deploy", "before:upgrade", "before"] {
      let json = format!(
        r#"{{ "deployments": [{{ "id": "web", "hooks": {{ "{}": "true" }} }}] }}"#,
        key
      );
      let err = resolve(runfile(&json)).unwrap_err();
      assert!(matches!(err, ResolverError::InvalidHook { .. }), "{key}");
    }
  }

  #[test]
  fn test_template_errors_reported_at_load() {
    let err = resolve(runfile(
      r#"{ "tasks": [{ "id": "a", "run": "echo ok", "if": "{{ env.CI " }] }"#,
    ))
    .unwrap_err();
    assert!(matches!(
      err,
      ResolverError::Template { ref id, ref field, .. } if id == "a" && field == "if"
    ));
  }
}
