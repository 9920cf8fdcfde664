use std::io;
use std::path::PathBuf;

/// Errors from loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The file could not be read.
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The runfile is not valid JSON or does not match the expected shape.
  #[error("invalid runfile {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// A line in an env file is not `KEY=VALUE`.
  #[error("line {line}: {message}")]
  EnvLine { line: usize, message: String },
}
