//! Store transport interface
//!
//! The replicated store itself is an external collaborator. The
//! reconciliation core needs three things from it: a feed of raw node
//! deliveries, a way to issue field writes, and a monotonic logical clock to
//! timestamp signed writes.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::{Node, Value};

mod memory;

pub use memory::MemoryTransport;

/// One raw node delivered by the store
///
/// `key` is the store's own name for the delivery; it stands in for the id
/// when the node arrives without its metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub node: Node,
    #[serde(default)]
    pub key: String,
}

impl Delivery {
    pub fn new(node: Node, key: impl Into<String>) -> Self {
        Self {
            node,
            key: key.into(),
        }
    }

    /// The snapshot key this delivery lands under
    pub fn id(&self) -> &str {
        self.node.id().unwrap_or(&self.key)
    }
}

impl From<Node> for Delivery {
    fn from(node: Node) -> Self {
        let key = node.id().unwrap_or_default().to_string();
        Self { node, key }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("transport closed")]
    Closed,
}

#[async_trait]
pub trait StoreTransport: Send + Sync + Debug + 'static {
    /// Write one field of one entity
    async fn put(&self, id: &str, field: &str, value: Value) -> Result<(), TransportError>;

    /// Next logical timestamp; strictly increasing across calls
    fn state(&self) -> u64;

    /// Subscribe to node deliveries
    ///
    /// The stream ends when the transport is closed.
    fn subscribe(&self) -> flume::Receiver<Delivery>;
}
