use std::path::Path;

use crate::ConfigError;

/// Parse `KEY=VALUE` lines.
///
/// Blank lines and lines starting with `#` are ignored, an `export ` prefix is
/// allowed, and a value wrapped in matching single or double quotes is
/// unwrapped. Later lines override earlier ones when the caller collects the
/// pairs into a map.
pub fn parse_env_file(text: &str) -> Result<Vec<(String, String)>, ConfigError> {
  let mut pairs = Vec::new();

  for (index, raw) in text.lines().enumerate() {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let Some((key, value)) = line.split_once('=') else {
      return Err(ConfigError::EnvLine {
        line: index + 1,
        message: format!("expected KEY=VALUE, got '{}'", line),
      });
    };
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
      return Err(ConfigError::EnvLine {
        line: index + 1,
        message: format!("invalid variable name '{}'", key),
      });
    }

    pairs.push((key.to_string(), unquote(value.trim()).to_string()));
  }

  Ok(pairs)
}

/// Read and parse an env file.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<Vec<(String, String)>, ConfigError> {
  let path = path.as_ref();
  let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  parse_env_file(&text)
}

fn unquote(value: &str) -> &str {
  for quote in ['"', '\''] {
    if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
      return &value[1..value.len() - 1];
    }
  }
  value
}
