/**
 * Decryption cache shared by the decoder
 *  and the write encoder.
 */
pub mod cache;
/**
 * Batches bursts of node updates into
 *  one published snapshot per window.
 */
pub mod coalescer;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Field encryption and write signing
 */
pub mod crypto;
/**
 * Raw node -> decrypted node, with key
 *  material propagation into the vault.
 */
pub mod decoder;
/**
 * Plaintext write -> sealed and signed
 *  wire value.
 */
pub mod encoder;
/**
 * Graph data model: nodes, values,
 *  entity ids, snapshots and sets.
 */
pub mod graph;
/**
 * Ties the pieces together for one
 *  consumer of the store.
 */
pub mod session;
/**
 * Test doubles for the crypto primitives.
 */
pub mod testkit;
/**
 * Interface to the replicated store, plus
 *  an in-memory implementation.
 */
pub mod transport;
/**
 * Registry of decryption keys, by
 *  owner public key.
 */
pub mod vault;

pub mod prelude {
    pub use crate::coalescer::{SnapshotReceiver, UpdateCoalescer};
    pub use crate::crypto::{Cipher, KeyMaterial, PublicKey, SeaCipher, Secret, SecretKey};
    pub use crate::decoder::{DecodeReport, DropReason};
    pub use crate::graph::{EntityId, Node, Snapshot, Value};
    pub use crate::session::{Session, SessionConfig, SessionError};
    pub use crate::transport::{Delivery, MemoryTransport, StoreTransport};
    pub use crate::vault::KeyVault;
}
