//! Message sinks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::message::{Message, Payload, Severity};

/// Receives messages from the bus.
///
/// Implement this trait to observe a run. The bus calls `receive` from
/// [`Bus::send`](crate::Bus::send) and `receive_async` from
/// [`Bus::send_async`](crate::Bus::send_async); implementations decide what to
/// do with them (render, persist, log, ignore).
#[async_trait]
pub trait Sink: Send + Sync {
  fn receive(&self, message: &Message);

  async fn receive_async(&self, message: &Message) {
    self.receive(message);
  }
}

/// A sink that discards all messages.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
  fn receive(&self, _message: &Message) {}
}

/// A sink that forwards messages to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  // Unbounded so a slow consumer never blocks a run. Volume is a handful of
  // messages per entity.
  sender: mpsc::UnboundedSender<Message>,
}

impl ChannelSink {
  pub fn new(sender: mpsc::UnboundedSender<Message>) -> Self {
    Self { sender }
  }
}

impl Sink for ChannelSink {
  fn receive(&self, message: &Message) {
    // Receiver may have been dropped
    let _ = self.sender.send(message.clone());
  }
}

/// A sink that writes every message as a `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
  fn receive(&self, message: &Message) {
    let topic = message.topic.as_str();
    match &message.payload {
      Payload::Started { id, .. } => info!(topic, entity_id = %id, "entity_started"),
      Payload::Completed { id, .. } => info!(topic, entity_id = %id, "entity_completed"),
      Payload::Skipped { id, reason, .. } => {
        info!(topic, entity_id = %id, reason = %reason, "entity_skipped")
      }
      Payload::Cancelled { id, .. } => warn!(topic, entity_id = %id, "entity_cancelled"),
      Payload::Failed { id, error, .. } => {
        error!(topic, entity_id = %id, error = %error, "entity_failed")
      }
      Payload::FoundMissingDependencies { entries } => {
        error!(topic, entries = ?entries, "missing_dependencies")
      }
      Payload::FoundCyclicalReferences { cycles } => {
        error!(topic, cycles = ?cycles, "cyclical_references")
      }
      Payload::Diagnostic(d) => match d.severity {
        Severity::Trace => trace!(topic, "{}", d.text),
        Severity::Debug => debug!(topic, "{}", d.text),
        Severity::Info => info!(topic, "{}", d.text),
        Severity::Warning => warn!(topic, "{}", d.text),
        Severity::Error => error!(topic, "{}", d.text),
      },
    }
  }
}
