use std::sync::Arc;

use anyhow::Context;
use bosun_context::RunContext;
use bosun_engine::{Handler, Invocation, handler_fn};
use bosun_pipeline::ExecutionError;
use bosun_shell::{ShellCommand, ShellError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::template::{TemplateContext, render};

const SET_ENV: &str = "::set-env ";
const SET_SECRET: &str = "::set-secret ";

/// A handler that renders `script` and runs it through the platform shell.
///
/// The script runs in the resolved working directory with the resolved
/// environment. Its output is `{exit_code, stdout, stderr}`; a non-zero exit
/// fails the entity. Stdout lines of the form `::set-env NAME=VALUE` and
/// `::set-secret NAME=VALUE` are applied to the run context and left out of
/// the reported stdout.
pub fn shell_handler(script: impl Into<String>) -> Arc<dyn Handler> {
  let script: Arc<str> = Arc::from(script.into());
  handler_fn(move |invocation, cancel| {
    let script = script.clone();
    async move { run_script(&script, invocation, cancel).await }
  })
}

async fn run_script(
  script: &str,
  invocation: Invocation,
  cancel: CancellationToken,
) -> anyhow::Result<Option<Value>> {
  let context = TemplateContext::new(invocation.data.env.clone(), invocation.run.secrets());
  let rendered = render(script, &context)
    .with_context(|| format!("failed to render script for '{}'", invocation.id))?;

  let output = ShellCommand::script(rendered)
    .cwd(&invocation.data.cwd)
    .envs(invocation.data.env.iter())
    .output(&cancel)
    .await;
  let mut output = match output {
    Ok(output) => output,
    Err(ShellError::Cancelled) => return Err(ExecutionError::Cancelled.into()),
    Err(e) => return Err(e.into()),
  };

  let applied = apply_directives(&output.stdout, &invocation.run);
  if applied > 0 {
    debug!(entity_id = %invocation.id, directives = applied, "shell_directives_applied");
    output.stdout = strip_directives(&output.stdout);
  }

  let output = output.into_result()?;
  Ok(Some(serde_json::to_value(output)?))
}

/// Apply `::set-env` and `::set-secret` lines to the run context.
///
/// Returns how many lines were applied. Lines without `=` are ignored.
pub fn apply_directives(stdout: &str, run: &RunContext) -> usize {
  let mut applied = 0;
  for line in stdout.lines() {
    let line = line.trim();
    if let Some((key, value)) = directive(line, SET_ENV) {
      run.set_env(key, value);
      applied += 1;
    } else if let Some((key, value)) = directive(line, SET_SECRET) {
      run.set_secret(key, value);
      applied += 1;
    }
  }
  applied
}

fn directive<'a>(line: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
  let (key, value) = line.strip_prefix(prefix)?.split_once('=')?;
  let key = key.trim();
  (!key.is_empty()).then_some((key, value))
}

fn strip_directives(stdout: &str) -> String {
  stdout
    .lines()
    .filter(|line| {
      let line = line.trim();
      !line.starts_with(SET_ENV) && !line.starts_with(SET_SECRET)
    })
    .map(|line| format!("{}\n", line))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use bosun_bus::Bus;

  #[test]
  fn test_apply_directives() {
    let run = RunContext::new(Bus::default());
    let stdout = "building\n::set-env VERSION=1.4.0\n  ::set-secret TOKEN=a=b\n::set-env broken\n";

    assert_eq!(apply_directives(stdout, &run), 2);
    assert_eq!(run.env_var("VERSION").as_deref(), Some("1.4.0"));
    assert_eq!(run.secret("TOKEN").as_deref(), Some("a=b"));
  }

  #[test]
  fn test_strip_directives() {
    let stdout = "one\n::set-secret TOKEN=x\ntwo\n";
    assert_eq!(strip_directives(stdout), "one\ntwo\n");
  }
}
