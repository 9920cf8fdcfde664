use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate id: {0}")]
  DuplicateId(String),

  #[error("unknown target: {0}")]
  UnknownTarget(String),
}
