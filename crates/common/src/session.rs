//! Session
//!
//! A session owns everything one consumer of the store needs to turn its
//! change feed into a decrypted snapshot: a key vault, a decryption cache, a
//! cipher, an update coalescer and a handle to the transport. Sessions are
//! cheap to clone; clones share state.
//!
//! Inbound: [`Session::receive`] decodes a delivery and queues it into the
//! coalescer. Outbound: [`Session::put`] lands the write in the snapshot
//! immediately, then encodes it and hands it to the transport. The store's
//! echo of the write arrives later through `receive` and overwrites the
//! optimistic value.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::DecryptionCache;
use crate::coalescer::{SnapshotReceiver, UpdateCoalescer, DEFAULT_COALESCE_WINDOW_MS};
use crate::crypto::{Cipher, CipherError, KeyMaterial, PublicKey, SeaCipher};
use crate::decoder::{DecodeReport, NodeDecoder, OWNER_ENCRYPTION_KEY_FIELD};
use crate::encoder::WriteEncoder;
use crate::graph::{derive_child_id, members_of, resolve_owner, Node, Snapshot, Value};
use crate::transport::{Delivery, StoreTransport, TransportError};
use crate::vault::KeyVault;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to encode write: {0}")]
    Encode(#[from] CipherError),
    #[error("failed to send write: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to batch inbound updates before publishing a snapshot
    pub coalesce_window: Duration,
    /// Session-scoped id; a random UUID when not set
    pub session_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(DEFAULT_COALESCE_WINDOW_MS),
            session_id: None,
        }
    }
}

pub struct Session<T, C = SeaCipher> {
    id: String,
    keys: Option<Arc<KeyMaterial>>,
    vault: KeyVault,
    cache: DecryptionCache,
    cipher: Arc<C>,
    transport: Arc<T>,
    coalescer: UpdateCoalescer,
}

impl<T, C> Clone for Session<T, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            keys: self.keys.clone(),
            vault: self.vault.clone(),
            cache: self.cache.clone(),
            cipher: self.cipher.clone(),
            transport: self.transport.clone(),
            coalescer: self.coalescer.clone(),
        }
    }
}

impl<T, C> std::fmt::Debug for Session<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("public_key", &self.keys.as_ref().and_then(|keys| keys.public()))
            .field("coalescer", &self.coalescer)
            .finish()
    }
}

impl<T, C> Session<T, C>
where
    T: StoreTransport,
    C: Cipher,
{
    /// Create a session and the receiving end of its snapshot feed
    ///
    /// The session's own encryption keys are registered in its vault under
    /// its own public key, so data it owns decrypts without a key grant.
    pub fn new(
        transport: T,
        cipher: C,
        keys: Option<KeyMaterial>,
        config: SessionConfig,
    ) -> (Self, SnapshotReceiver) {
        let id = config
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let (coalescer, receiver) = UpdateCoalescer::new(config.coalesce_window, Snapshot::new());

        let vault = KeyVault::new();
        if let Some(keys) = &keys {
            if let Some(public_key) = keys.public() {
                let public_key = public_key.to_hex();
                if let Some(key) = &keys.encryption {
                    vault.remember_self_key(public_key.as_str(), key.clone());
                }
                if let Some(key) = keys.delegation_key() {
                    vault.remember_delegated_key(public_key.as_str(), key.clone());
                }
            }
        }

        tracing::info!(session = %id, authenticated = keys.is_some(), "session created");

        let session = Self {
            id,
            keys: keys.map(Arc::new),
            vault,
            cache: DecryptionCache::new(),
            cipher: Arc::new(cipher),
            transport: Arc::new(transport),
            coalescer,
        };
        (session, receiver)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.keys.as_ref().and_then(|keys| keys.public())
    }

    /// This session's id scoped to `owner`, or to itself when `owner` is None
    pub fn child_id(&self, owner: Option<&str>) -> String {
        match owner {
            Some(owner) => derive_child_id(&self.id, Some(owner)),
            None => {
                let own = self.public_key().map(|key| key.to_hex());
                derive_child_id(&self.id, own.as_deref())
            }
        }
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn cache(&self) -> &DecryptionCache {
        &self.cache
    }

    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn coalescer(&self) -> &UpdateCoalescer {
        &self.coalescer
    }

    /// Decode one delivery and queue it for the next snapshot
    pub async fn receive(&self, delivery: Delivery) -> DecodeReport {
        let id = delivery.id().to_string();
        let (decoded, report) =
            NodeDecoder::new(&self.vault, &self.cache, self.cipher.as_ref())
                .decode_with_report(&delivery.node)
                .await;

        if !report.is_clean() {
            tracing::debug!(id = %id, dropped = report.dropped.len(), "partially decoded node");
        }

        self.coalescer.enqueue(move |mut snapshot: Snapshot| {
            snapshot.insert(id, decoded);
            snapshot
        });
        report
    }

    /// Write one field
    ///
    /// The plaintext lands in the snapshot before the store sees the write.
    /// The write is sealed only with a key this session's vault holds for
    /// the id's owner, and signed only when that owner is this session, so
    /// the store's echo always decodes back to the written value.
    pub async fn put(&self, id: &str, field: &str, value: Value) -> Result<(), SessionError> {
        {
            let value = value.clone();
            self.coalescer
                .apply_now(|snapshot| snapshot.with_field(id, field, value));
        }

        let wire = WriteEncoder::new(&self.cache, self.cipher.as_ref())
            .encode_write(
                id,
                field,
                value,
                self.write_keys(id, field).as_ref(),
                self.transport.state(),
            )
            .await?;

        self.transport.put(id, field, wire).await.map_err(|error| {
            tracing::warn!(id, field, %error, "store write failed");
            error
        })?;
        Ok(())
    }

    fn write_keys(&self, id: &str, field: &str) -> Option<KeyMaterial> {
        let keys = self.keys.as_deref()?;
        let Some(owner) = resolve_owner(id) else {
            // public ids go out in the clear
            return Some(KeyMaterial {
                signing: keys.signing.clone(),
                ..Default::default()
            });
        };

        let is_own = keys.public().is_some_and(|key| key.to_hex() == owner);
        let mut scoped = KeyMaterial {
            signing: keys.signing.clone().filter(|_| is_own),
            ..Default::default()
        };
        if field == OWNER_ENCRYPTION_KEY_FIELD {
            scoped.owner_encryption = self.vault.lookup_delegated_key(&owner);
        } else {
            scoped.encryption = self.vault.lookup_self_key(&owner);
        }
        Some(scoped)
    }

    /// Members of the set stored at `id`, as of the current snapshot
    pub fn members_of(&self, id: &str) -> Vec<Node> {
        let snapshot = self.coalescer.snapshot();
        members_of(&snapshot, id).into_iter().cloned().collect()
    }

    /// An additional snapshot feed, starting with the next publish
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.coalescer.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.coalescer.snapshot()
    }

    /// Publish everything queued without waiting for the window
    pub fn flush(&self) -> bool {
        self.coalescer.flush_now()
    }
}
