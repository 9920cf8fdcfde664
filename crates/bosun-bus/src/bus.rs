//! The message bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use crate::message::{Message, Severity};
use crate::sink::Sink;
use crate::topic::topic_matches;

struct Entry {
  id: u64,
  topics: Vec<String>,
  sink: Arc<dyn Sink>,
}

impl Entry {
  fn matches(&self, topic: &str) -> bool {
    self.topics.iter().any(|pattern| topic_matches(pattern, topic))
  }
}

struct Inner {
  subscriptions: RwLock<Vec<Arc<Entry>>>,
  next_id: AtomicU64,
  min_severity: RwLock<Severity>,
}

impl Inner {
  fn remove(&self, id: u64) {
    self.subscriptions.write().retain(|e| e.id != id);
  }
}

/// Topic-based publish/subscribe bus.
///
/// Cloning a `Bus` yields another handle to the same subscriptions. Sends
/// dispatch to a snapshot of the subscriptions taken when the send starts, so
/// sinks may subscribe or unsubscribe while a send is in flight.
#[derive(Clone)]
pub struct Bus {
  inner: Arc<Inner>,
}

impl Bus {
  /// Create a bus that drops diagnostics below `min_severity`.
  pub fn new(min_severity: Severity) -> Self {
    Self {
      inner: Arc::new(Inner {
        subscriptions: RwLock::new(Vec::new()),
        next_id: AtomicU64::new(1),
        min_severity: RwLock::new(min_severity),
      }),
    }
  }

  pub fn min_severity(&self) -> Severity {
    *self.inner.min_severity.read()
  }

  pub fn set_min_severity(&self, severity: Severity) {
    *self.inner.min_severity.write() = severity;
  }

  /// Subscribe a sink to one or more topic patterns.
  ///
  /// The returned [`Subscription`] removes the sink when dropped.
  pub fn subscribe<S, I, T>(&self, sink: S, topics: I) -> Subscription
  where
    S: Sink + 'static,
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.subscribe_shared(Arc::new(sink), topics)
  }

  /// Subscribe a sink that is shared with other owners.
  pub fn subscribe_shared<I, T>(&self, sink: Arc<dyn Sink>, topics: I) -> Subscription
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
    trace!(subscription_id = id, topics = ?topics, "bus_subscribe");

    self
      .inner
      .subscriptions
      .write()
      .push(Arc::new(Entry { id, topics, sink }));

    Subscription {
      id,
      bus: Arc::downgrade(&self.inner),
      detached: false,
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.inner.subscriptions.read().len()
  }

  /// Deliver a message to every matching sink.
  pub fn send(&self, message: Message) {
    for entry in self.matching(&message) {
      entry.sink.receive(&message);
    }
  }

  /// Deliver a message to every matching sink and wait for all of them.
  pub async fn send_async(&self, message: Message) {
    let entries = self.matching(&message);
    futures::future::join_all(entries.iter().map(|e| e.sink.receive_async(&message))).await;
  }

  /// Publish a diagnostic message.
  pub fn diagnostic(&self, severity: Severity, text: impl Into<String>) {
    self.send(Message::diagnostic(severity, text));
  }

  /// Snapshot the subscriptions that should see `message`.
  fn matching(&self, message: &Message) -> Vec<Arc<Entry>> {
    if let Some(severity) = message.severity() {
      if severity < self.min_severity() {
        return Vec::new();
      }
    }

    let snapshot: Vec<Arc<Entry>> = self.inner.subscriptions.read().clone();
    snapshot
      .into_iter()
      .filter(|e| e.matches(&message.topic))
      .collect()
  }
}

impl Default for Bus {
  fn default() -> Self {
    Self::new(Severity::Info)
  }
}

impl std::fmt::Debug for Bus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Bus")
      .field("subscribers", &self.subscriber_count())
      .field("min_severity", &self.min_severity())
      .finish()
  }
}

/// Handle for a bus subscription. Dropping it unsubscribes the sink.
#[must_use = "dropping a Subscription unsubscribes its sink"]
pub struct Subscription {
  id: u64,
  bus: Weak<Inner>,
  detached: bool,
}

impl Subscription {
  pub fn id(&self) -> u64 {
    self.id
  }

  /// Remove the sink from the bus.
  pub fn unsubscribe(self) {}

  /// Keep the sink subscribed for as long as the bus lives.
  pub fn detach(mut self) {
    self.detached = true;
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if self.detached {
      return;
    }
    if let Some(inner) = self.bus.upgrade() {
      trace!(subscription_id = self.id, "bus_unsubscribe");
      inner.remove(self.id);
    }
  }
}
