use std::io;

/// Errors from running a shell command.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
  /// The program could not be started.
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// Waiting on the program or reading its output failed.
  #[error("failed to wait for '{program}': {source}")]
  Io {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The program ran but exited unsuccessfully.
  #[error("exited with code {code}{}", stderr_suffix(.stderr))]
  NonZeroExit { code: i32, stderr: String },

  /// The token fired before the program finished. The child was killed.
  #[error("cancelled")]
  Cancelled,
}

fn stderr_suffix(stderr: &str) -> String {
  let trimmed = stderr.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!(": {}", trimmed)
  }
}
