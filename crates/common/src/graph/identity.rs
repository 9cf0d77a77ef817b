//! Entity identifiers and ownership chains
//!
//! Identifiers are plain strings on the wire. An identifier may carry a chain
//! of ownership segments after its session-scoped part:
//!
//! ```text
//! <session>                       public data, no owner
//! <session>~<pub>.                owned by <pub>
//! <session>~<pubA>.~<pubB>.       owned by <pubA>, delegated to <pubB>
//! ~<pub>                          the root node of identity <pub>
//! ~@<alias>                       an alias lookup node, no owner
//! ```
//!
//! The *owner* of an identifier is its first key segment and the *target* is
//! its last. A chain of one segment has the same owner and target. Parsing is
//! total: anything that does not look like a key segment simply contributes
//! no key.

use std::fmt;

const SEGMENT_DELIMITER: char = '~';
const SEGMENT_TERMINATOR: char = '.';
const ALIAS_MARKER: char = '@';

/// One `~`-delimited segment after the session part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A public key segment
    Key(String),
    /// An alias segment (`~@name`), which names no key
    Alias(String),
    /// Trailing text that is neither; ignored for ownership
    Opaque(String),
}

impl Segment {
    fn parse(raw: &str, user_root: bool) -> Self {
        if let Some(alias) = raw.strip_prefix(ALIAS_MARKER) {
            return Segment::Alias(alias.to_string());
        }
        match raw.strip_suffix(SEGMENT_TERMINATOR) {
            Some(key) if !key.is_empty() => Segment::Key(key.to_string()),
            // `~<pub>` with nothing before it addresses the identity's root node
            None if user_root && !raw.is_empty() => Segment::Key(raw.to_string()),
            _ => Segment::Opaque(raw.to_string()),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            _ => None,
        }
    }
}

/// A parsed entity identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityId {
    raw: String,
    session: String,
    segments: Vec<Segment>,
}

impl EntityId {
    pub fn parse(id: &str) -> Self {
        let mut parts = id.split(SEGMENT_DELIMITER);
        let session = parts.next().unwrap_or_default().to_string();
        let user_root = session.is_empty();
        let segments = parts.map(|raw| Segment::parse(raw, user_root)).collect();
        Self {
            raw: id.to_string(),
            session,
            segments,
        }
    }

    /// The session-scoped part before the first `~`
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Key segments in chain order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::key)
    }

    /// First key in the chain
    pub fn owner(&self) -> Option<&str> {
        self.keys().next()
    }

    /// Last key in the chain
    pub fn target(&self) -> Option<&str> {
        self.keys().last()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::parse(id)
    }
}

/// The owning public key of an identifier
pub fn resolve_owner(id: &str) -> Option<String> {
    EntityId::parse(id).owner().map(str::to_string)
}

/// The target public key of an identifier
pub fn resolve_target(id: &str) -> Option<String> {
    EntityId::parse(id).target().map(str::to_string)
}

/// Scope a session identifier to an owner, if one is given
pub fn derive_child_id(session_id: &str, owner: Option<&str>) -> String {
    match owner {
        Some(owner) if !owner.is_empty() => format!(
            "{}{}{}{}",
            session_id, SEGMENT_DELIMITER, owner, SEGMENT_TERMINATOR
        ),
        _ => session_id.to_string(),
    }
}
