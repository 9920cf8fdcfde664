/// Errors raised while resolving a [`Deferred`](crate::Deferred) value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
  /// The factory returned an error.
  #[error("factory failed: {message}")]
  Factory { message: String },

  /// Resolution was cancelled before the factory finished.
  #[error("resolution cancelled")]
  Cancelled,
}

impl ResolveError {
  pub fn factory(error: anyhow::Error) -> Self {
    Self::Factory {
      message: format!("{:#}", error),
    }
  }
}
