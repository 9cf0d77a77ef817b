use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Delivery, StoreTransport, TransportError};
use crate::graph::{Node, Value};

/// In-memory store transport
///
/// Keeps one node per entity and re-delivers the whole node to every
/// subscriber after each change, the way a store echoes writes back to the
/// writer. Raw nodes from "other peers" can be injected with
/// [`MemoryTransport::publish`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryTransportInner>>,
}

#[derive(Debug, Default)]
struct MemoryTransportInner {
    nodes: HashMap<String, Node>,
    subscribers: Vec<flume::Sender<Delivery>>,
    last_state: u64,
    closed: bool,
}

impl MemoryTransportInner {
    fn deliver(&mut self, id: &str) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let delivery = Delivery::new(node.clone(), id);
        self.subscribers
            .retain(|subscriber| subscriber.send(delivery.clone()).is_ok());
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a raw node into the store as if another peer had written it
    pub fn publish(&self, delivery: Delivery) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        let id = delivery.id().to_string();
        inner
            .nodes
            .entry(id.clone())
            .or_insert_with(|| Node::new(id.as_str()))
            .merge(&delivery.node);
        inner.deliver(&id);
        Ok(())
    }

    /// The raw node currently stored for `id`
    pub fn node(&self, id: &str) -> Option<Node> {
        self.inner.lock().nodes.get(id).cloned()
    }

    /// Stop accepting writes and end every subscription
    ///
    /// Subscribers still receive whatever was delivered before closing.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }
}

#[async_trait]
impl StoreTransport for MemoryTransport {
    async fn put(&self, id: &str, field: &str, value: Value) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        inner
            .nodes
            .entry(id.to_string())
            .or_insert_with(|| Node::new(id))
            .put(field, value);
        inner.deliver(id);
        Ok(())
    }

    fn state(&self) -> u64 {
        let mut inner = self.inner.lock();
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        inner.last_state = now.max(inner.last_state + 1);
        inner.last_state
    }

    fn subscribe(&self) -> flume::Receiver<Delivery> {
        let (tx, rx) = flume::unbounded();
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        rx
    }
}
