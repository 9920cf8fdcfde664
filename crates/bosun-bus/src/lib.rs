//! Bosun Bus
//!
//! Publish/subscribe channel for run progress and diagnostics. The engine
//! publishes a [`Message`] for every state change of an entity and for
//! structural problems found before a run; sinks decide what to do with them
//! (render to a terminal, forward to `tracing`, collect in a test).
//!
//! ```ignore
//! use bosun_bus::{Bus, ChannelSink, Severity};
//!
//! let bus = Bus::new(Severity::Info);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let subscription = bus.subscribe(ChannelSink::new(tx), ["deploy:*"]);
//! ```

mod bus;
mod message;
mod sink;
mod topic;

pub use bus::{Bus, Subscription};
pub use message::{Diagnostic, Message, Payload, Severity};
pub use sink::{ChannelSink, NoopSink, Sink, TracingSink};
pub use topic::topic_matches;
