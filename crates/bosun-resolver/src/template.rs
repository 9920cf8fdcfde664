//! Template rendering against the run environment.
//!
//! Templates see two maps:
//!
//! ```text
//! {{ env.TARGET }}     environment (run env, entity overlay, hook additions)
//! {{ secrets.TOKEN }}  secrets
//! ```
//!
//! Keys match regardless of case, like [`Variables`] lookups. Undefined names
//! render as empty strings.

use std::sync::Arc;

use bosun_context::{RunContext, Variables};
use minijinja::value::{Enumerator, Object, ObjectRepr};
use minijinja::{Environment, Value, context};

/// What a template can reference.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
  pub env: Variables,
  pub secrets: Variables,
}

impl TemplateContext {
  pub fn new(env: Variables, secrets: Variables) -> Self {
    Self { env, secrets }
  }

  /// Snapshot of a run context.
  pub fn from_run(run: &RunContext) -> Self {
    Self::new(run.env(), run.secrets())
  }
}

/// Render a template string.
pub fn render(template: &str, context: &TemplateContext) -> Result<String, minijinja::Error> {
  if !is_template(template) {
    return Ok(template.to_string());
  }
  let ctx = context! {
    env => Value::from_object(Lookup(context.env.clone())),
    secrets => Value::from_object(Lookup(context.secrets.clone())),
  };
  Environment::new().render_str(template, ctx)
}

/// Exposes variables to templates through [`Variables::get`].
#[derive(Debug)]
struct Lookup(Variables);

impl Object for Lookup {
  fn repr(self: &Arc<Self>) -> ObjectRepr {
    ObjectRepr::Map
  }

  fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
    self.0.get(key.as_str()?).map(Value::from)
  }

  fn enumerate(self: &Arc<Self>) -> Enumerator {
    Enumerator::Values(self.0.keys().map(Value::from).collect())
  }
}

/// Check that a template parses, without rendering it.
pub(crate) fn validate(template: &str) -> Result<(), minijinja::Error> {
  if !is_template(template) {
    return Ok(());
  }
  let env = Environment::new();
  env.template_from_str(template).map(|_| ())
}

fn is_template(s: &str) -> bool {
  s.contains("{{") || s.contains("{%")
}

/// Whether a rendered condition counts as true.
///
/// Empty, `false`, `0`, `no`, and `off` (any case, surrounding whitespace
/// ignored) are false; anything else is true.
pub fn is_truthy(value: &str) -> bool {
  let value = value.trim().to_ascii_lowercase();
  !matches!(value.as_str(), "" | "false" | "0" | "no" | "off")
}
