#![allow(dead_code)]

use std::sync::Arc;

use bosun_bus::{Bus, ChannelSink, Message};
use bosun_context::RunContext;
use bosun_engine::{Handler, handler_fn};
use bosun_graph::{Registry, Vertex};
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub fn ok() -> Arc<dyn Handler> {
  handler_fn(|_, _| async { anyhow::Ok(Some(json!("ok"))) })
}

pub fn fail(message: &'static str) -> Arc<dyn Handler> {
  handler_fn(move |_, _| async move { Err::<Option<Value>, _>(anyhow::anyhow!(message)) })
}

pub fn registry<T: Vertex>(entities: Vec<T>) -> Registry<Arc<T>> {
  entities
    .into_iter()
    .map(Arc::new)
    .collect::<Vec<_>>()
    .try_into()
    .unwrap()
}

/// A run context whose bus forwards every message into the returned channel.
pub fn context() -> (RunContext, mpsc::UnboundedReceiver<Message>) {
  let bus = Bus::default();
  let (tx, rx) = mpsc::unbounded_channel();
  bus.subscribe(ChannelSink::new(tx), ["*"]).detach();
  (RunContext::new(bus), rx)
}

pub fn drain_topics(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
  let mut topics = Vec::new();
  while let Ok(message) = rx.try_recv() {
    topics.push(message.topic);
  }
  topics
}
