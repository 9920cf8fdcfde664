use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::ShellError;

/// A program invocation, built up and then run with [`output`](Self::output).
#[derive(Debug, Clone)]
pub struct ShellCommand {
  program: String,
  args: Vec<String>,
  cwd: Option<PathBuf>,
  envs: Vec<(String, String)>,
}

impl ShellCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      envs: Vec::new(),
    }
  }

  /// Run `text` through the platform shell.
  #[cfg(not(windows))]
  pub fn script(text: impl Into<String>) -> Self {
    Self::new("sh").arg("-c").arg(text)
  }

  /// Run `text` through the platform shell.
  #[cfg(windows)]
  pub fn script(text: impl Into<String>) -> Self {
    Self::new("cmd").arg("/C").arg(text)
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.envs.push((key.into(), value.into()));
    self
  }

  /// Add variables on top of the inherited process environment.
  pub fn envs<I, K, V>(mut self, envs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self
      .envs
      .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }

  /// Run to completion, capturing stdout and stderr.
  ///
  /// A non-zero exit is not an error here; see [`ShellOutput::into_result`].
  #[instrument(name = "shell_run", skip(self, cancel), fields(program = %self.program))]
  pub async fn output(&self, cancel: &CancellationToken) -> Result<ShellOutput, ShellError> {
    if cancel.is_cancelled() {
      return Err(ShellError::Cancelled);
    }

    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    let child = command.spawn().map_err(|source| ShellError::Spawn {
      program: self.program.clone(),
      source,
    })?;
    debug!(pid = ?child.id(), cwd = ?self.cwd, "shell_spawned");

    // Dropping the wait future drops the child, which kills it.
    let output = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        debug!("shell_cancelled");
        return Err(ShellError::Cancelled);
      }
      output = child.wait_with_output() => output.map_err(|source| ShellError::Io {
        program: self.program.clone(),
        source,
      })?,
    };

    let output = ShellOutput {
      exit_code: output.status.code().unwrap_or(-1),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(exit_code = output.exit_code, "shell_exited");
    Ok(output)
  }
}

/// What a finished program left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutput {
  pub exit_code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl ShellOutput {
  pub fn success(&self) -> bool {
    self.exit_code == 0
  }

  /// Turn a non-zero exit into [`ShellError::NonZeroExit`].
  pub fn into_result(self) -> Result<Self, ShellError> {
    if self.success() {
      Ok(self)
    } else {
      Err(ShellError::NonZeroExit {
        code: self.exit_code,
        stderr: self.stderr,
      })
    }
  }
}
