//! Renders bus messages for a terminal.

use bosun_bus::{Message, Payload, Sink};

/// Writes one block per message to stderr.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
  fn receive(&self, message: &Message) {
    eprintln!("{}", render(message));
  }
}

/// Format a message. Structural failures list the offending entities.
pub fn render(message: &Message) -> String {
  let kind = message
    .topic
    .split_once(':')
    .map(|(kind, _)| kind)
    .unwrap_or(&message.topic);

  match &message.payload {
    Payload::Started { name, .. } => format!("[{}] {}: started", kind, name),
    Payload::Completed { name, .. } => format!("[{}] {}: completed", kind, name),
    Payload::Failed { name, error, .. } => format!("[{}] {}: failed: {}", kind, name, error),
    Payload::Cancelled { name, .. } => format!("[{}] {}: cancelled", kind, name),
    Payload::Skipped { name, reason, .. } => format!("[{}] {}: skipped ({})", kind, name, reason),
    Payload::FoundMissingDependencies { entries } => {
      let mut out = format!("[{}] missing dependencies:", kind);
      for entry in entries {
        out.push_str(&format!("\n  {} needs {}", entry.id, entry.missing.join(", ")));
      }
      out
    }
    Payload::FoundCyclicalReferences { cycles } => {
      let mut out = format!("[{}] cyclical references:", kind);
      for cycle in cycles {
        let mut ids = cycle.ids.clone();
        if let Some(first) = cycle.ids.first() {
          ids.push(first.clone());
        }
        out.push_str(&format!("\n  {}", ids.join(" -> ")));
      }
      out
    }
    Payload::Diagnostic(diagnostic) => format!("[{}] {}", diagnostic.severity, diagnostic.text),
  }
}
