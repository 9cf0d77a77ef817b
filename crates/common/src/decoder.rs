//! Node decoder
//!
//! Turns a raw node from the store into the node the application sees:
//!
//! 1. signed values (`SIG{...}`) are verified and unwrapped
//! 2. ciphertext values (`SEA{...}`) are decrypted with the key registered
//!    for the node's owner, through the decryption cache
//! 3. everything else is copied through
//!
//! A field that cannot be unwrapped or decrypted is left out of the result,
//! never set to null. Decrypted key-material fields are registered in the key
//! vault under the node's *target* key, so keys flow down an ownership chain
//! as its nodes arrive.

use std::fmt;

use crate::cache::DecryptionCache;
use crate::crypto::{is_ciphertext, Cipher, CipherError, Secret, SignedEnvelope};
use crate::graph::{EntityId, Node, Scalar, Value};
use crate::vault::KeyVault;

/// Field holding an identity's self encryption key
pub const ENCRYPTION_KEY_FIELD: &str = "epriv";
/// Field holding a private key forwarded to a delegated identity
pub const OWNER_ENCRYPTION_KEY_FIELD: &str = "ownerEpriv";

/// Why a field was left out of a decoded node
///
/// None of these are errors: each may clear up on a later delivery of the
/// same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No key registered yet for the field's owner
    MissingKey,
    /// A key was registered but the primitive rejected the ciphertext
    DecryptionFailure,
    /// A signed value did not verify against the node
    InvalidSignature,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingKey => f.write_str("missing key"),
            DropReason::DecryptionFailure => f.write_str("decryption failure"),
            DropReason::InvalidSignature => f.write_str("invalid signature"),
        }
    }
}

/// What happened while decoding one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub dropped: Vec<(String, DropReason)>,
    /// Public keys that received new key material
    pub registered: Vec<String>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }

    fn drop_field(&mut self, field: &str, reason: DropReason) {
        tracing::debug!(field, %reason, "dropping field");
        self.dropped.push((field.to_string(), reason));
    }
}

/// Decodes raw nodes against one session's vault and cache
#[derive(Debug)]
pub struct NodeDecoder<'a, C: Cipher + ?Sized> {
    vault: &'a KeyVault,
    cache: &'a DecryptionCache,
    cipher: &'a C,
}

impl<'a, C: Cipher + ?Sized> NodeDecoder<'a, C> {
    pub fn new(vault: &'a KeyVault, cache: &'a DecryptionCache, cipher: &'a C) -> Self {
        Self {
            vault,
            cache,
            cipher,
        }
    }

    pub async fn decode(&self, raw: &Node) -> Node {
        self.decode_with_report(raw).await.0
    }

    pub async fn decode_with_report(&self, raw: &Node) -> (Node, DecodeReport) {
        let identity = raw.id().map(EntityId::parse);
        let owner = identity.as_ref().and_then(EntityId::owner);
        let target = identity.as_ref().and_then(EntityId::target);

        let mut decoded = raw.empty_like();
        let mut report = DecodeReport::default();

        for (field, value) in raw.fields() {
            let value = match value.as_text() {
                Some(text) if SignedEnvelope::is_signed(text) => {
                    match self.unwrap_signed(raw.id(), owner, field, text) {
                        Some(inner) => inner,
                        None => {
                            report.drop_field(field, DropReason::InvalidSignature);
                            continue;
                        }
                    }
                }
                _ => value.clone(),
            };

            let Some(ciphertext) = value
                .as_text()
                .filter(|text| is_ciphertext(text))
                .map(str::to_string)
            else {
                decoded.put(field, value);
                continue;
            };

            let Some(key) = self.key_for(owner, field) else {
                report.drop_field(field, DropReason::MissingKey);
                continue;
            };

            let plaintext = self
                .cache
                .get_or_try_compute(&ciphertext, || self.decrypt(&ciphertext, &key))
                .await;

            match plaintext {
                Ok(plaintext) => {
                    if let Some(public_key) = self.register_key_material(target, field, &plaintext)
                    {
                        report.registered.push(public_key);
                    }
                    decoded.put(field, plaintext);
                }
                Err(error) => {
                    tracing::trace!(field, %error, "decrypt rejected");
                    report.drop_field(field, DropReason::DecryptionFailure);
                }
            }
        }

        (decoded, report)
    }

    /// An empty plaintext counts as a failed decryption
    async fn decrypt(&self, ciphertext: &str, key: &Secret) -> Result<Scalar, CipherError> {
        let plaintext = self.cipher.decrypt(ciphertext, key).await?;
        if plaintext.is_blank() {
            return Err(CipherError::EmptyPlaintext);
        }
        Ok(plaintext)
    }

    fn key_for(&self, owner: Option<&str>, field: &str) -> Option<Secret> {
        let owner = owner?;
        if field == OWNER_ENCRYPTION_KEY_FIELD {
            self.vault.lookup_delegated_key(owner)
        } else {
            self.vault.lookup_self_key(owner)
        }
    }

    /// A signed value must name this node and field, and come from its owner
    fn unwrap_signed(
        &self,
        id: Option<&str>,
        owner: Option<&str>,
        field: &str,
        text: &str,
    ) -> Option<Value> {
        let signed = match SignedEnvelope::from_wire(text) {
            Ok(signed) => signed,
            Err(error) => {
                tracing::trace!(field, %error, "unparseable signed value");
                return None;
            }
        };
        if let Err(error) = signed.verify() {
            tracing::trace!(field, %error, "signature rejected");
            return None;
        }
        let envelope = &signed.envelope;
        if envelope.field != field || id.is_some_and(|id| id != envelope.id) {
            return None;
        }
        if owner.is_some_and(|owner| owner != signed.signer()) {
            return None;
        }
        Some(signed.envelope.value)
    }

    fn register_key_material(
        &self,
        target: Option<&str>,
        field: &str,
        plaintext: &Scalar,
    ) -> Option<String> {
        if field != ENCRYPTION_KEY_FIELD && field != OWNER_ENCRYPTION_KEY_FIELD {
            return None;
        }
        let Some(target) = target else {
            tracing::warn!(field, "key material on a node without an owner");
            return None;
        };
        let key = match plaintext.as_text().map(Secret::from_hex) {
            Some(Ok(key)) => key,
            _ => {
                tracing::warn!(field, target, "malformed key material");
                return None;
            }
        };

        if field == OWNER_ENCRYPTION_KEY_FIELD {
            self.vault.remember_delegated_key(target, key);
        } else {
            self.vault.remember_self_key(target, key);
        }
        Some(target.to_string())
    }
}

/// Decode one raw node; see [`NodeDecoder`]
pub async fn decode<C: Cipher + ?Sized>(
    raw: &Node,
    vault: &KeyVault,
    cache: &DecryptionCache,
    cipher: &C,
) -> Node {
    NodeDecoder::new(vault, cache, cipher).decode(raw).await
}
