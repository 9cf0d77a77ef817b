use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::value::Value;

/// Name of the metadata field every store node carries
pub const META_FIELD: &str = "_";

/// Node metadata: `{ "#": id }`
///
/// The store may attach more bookkeeping (per-field states, etc.); only the
/// identifier is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "#")]
    pub id: String,
}

/**
 * Nodes
 * =====
 * A node is a flat, ordered mapping from field name to [`Value`], plus
 *  the metadata field naming the node itself.
 * The same type describes a node both as delivered by the store (raw,
 *  possibly holding ciphertext) and after decoding (plaintext only).
 *  Field order is the order in which the store delivered the fields and
 *  is preserved through decoding, since set membership is read off it.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    meta: Option<Meta>,
    fields: Vec<(String, Value)>,
}

impl Node {
    /// Create an empty node with the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: Some(Meta { id: id.into() }),
            fields: Vec::new(),
        }
    }

    /// Create a node without metadata
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builder form of [`Node::put`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(field, value);
        self
    }

    /// The identifier carried in the metadata field, if any
    pub fn id(&self) -> Option<&str> {
        self.meta.as_ref().map(|meta| meta.id.as_str())
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Same metadata, no fields
    pub fn empty_like(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            fields: Vec::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Set a field, keeping its position if it already exists
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(index).1)
    }

    /// Fold every field of `other` into this node, later values winning
    pub fn merge(&mut self, other: &Node) {
        if self.meta.is_none() {
            self.meta = other.meta.clone();
        }
        for (field, value) in other.fields() {
            self.put(field, value.clone());
        }
    }

    /// Iterate fields in stored order; the metadata field is not included
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.fields.len() + usize::from(self.meta.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(meta) = &self.meta {
            map.serialize_entry(META_FIELD, meta)?;
        }
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = Node;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field names to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut node = Node::default();
                while let Some(field) = access.next_key::<String>()? {
                    if field == META_FIELD {
                        node.meta = Some(access.next_value()?);
                    } else {
                        let value: Value = access.next_value()?;
                        node.put(field, value);
                    }
                }
                Ok(node)
            }
        }

        deserializer.deserialize_map(NodeVisitor)
    }
}
