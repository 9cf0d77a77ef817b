//! Graph data model
//!
//! - **[`Node`]**: a flat, ordered field map with a metadata id
//! - **[`Value`]**: scalar, reference or (as text) ciphertext
//! - **[`EntityId`]**: identifier parser for ownership chains
//! - **[`Snapshot`]**: the decoded, application-visible store
//! - **[`members_of`]**: set reconstruction from reference fields

mod identity;
mod node;
mod set;
mod snapshot;
mod value;

pub use identity::{derive_child_id, resolve_owner, resolve_target, EntityId, Segment};
pub use node::{Meta, Node, META_FIELD};
pub use set::members_of;
pub use snapshot::Snapshot;
pub use value::{Ref, Scalar, Value};
