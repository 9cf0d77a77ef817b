use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::node::Node;
use super::value::Value;

/// The application-visible view of the graph: entity id -> decoded node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot(BTreeMap<String, Node>);

impl Deref for Snapshot {
    type Target = BTreeMap<String, Node>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node stored under `id`
    pub fn insert(&mut self, id: impl Into<String>, node: Node) -> Option<Node> {
        self.0.insert(id.into(), node)
    }

    /// Builder form of [`Snapshot::insert`]
    pub fn with_node(mut self, id: impl Into<String>, node: Node) -> Self {
        self.insert(id, node);
        self
    }

    /// Set one field of one node, creating the node if needed
    ///
    /// This is how optimistic local writes land before the store echoes them.
    pub fn with_field(mut self, id: &str, field: &str, value: Value) -> Self {
        self.0
            .entry(id.to_string())
            .or_insert_with(|| Node::new(id))
            .put(field, value);
        self
    }
}
