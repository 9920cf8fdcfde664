/// Errors from turning a runfile into entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolverError {
  /// Two entities of the same kind share an id.
  #[error("duplicate {kind} id '{id}'")]
  DuplicateId { kind: &'static str, id: String },

  /// A job lists a task that is not defined.
  #[error("job '{job}' lists unknown task '{task}'")]
  UnknownTask { job: String, task: String },

  /// A deployment hook key is not `<before|after>:<action>`.
  #[error("deployment '{deployment}' has invalid hook '{key}' (expected before:<action> or after:<action>)")]
  InvalidHook { deployment: String, key: String },

  /// A template does not parse.
  #[error("{id}: invalid template in '{field}': {message}")]
  Template {
    id: String,
    field: String,
    message: String,
  },
}
