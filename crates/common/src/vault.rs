//! Key vault
//!
//! Symmetric key material observed in the stream, indexed by the public key
//! it belongs to. There are two namespaces:
//!
//! - **self** keys decrypt fields the identity sealed for itself
//! - **delegated** keys decrypt the private-key slot an owner forwarded to
//!   the identity
//!
//! The vault only grows. A key observed again for the same identity replaces
//! the earlier one; nothing is ever removed. A vault is owned by one session
//! and shared by cloning the handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::crypto::Secret;

#[derive(Debug, Clone, Default)]
pub struct KeyVault {
    inner: Arc<RwLock<KeyVaultInner>>,
}

#[derive(Debug, Default)]
struct KeyVaultInner {
    self_keys: HashMap<String, Secret>,
    delegated_keys: HashMap<String, Secret>,
}

impl KeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember_self_key(&self, public_key: impl Into<String>, key: Secret) {
        let public_key = public_key.into();
        tracing::debug!(public_key = %public_key, "registering self key");
        self.inner.write().self_keys.insert(public_key, key);
    }

    pub fn remember_delegated_key(&self, public_key: impl Into<String>, key: Secret) {
        let public_key = public_key.into();
        tracing::debug!(public_key = %public_key, "registering delegated key");
        self.inner.write().delegated_keys.insert(public_key, key);
    }

    pub fn lookup_self_key(&self, public_key: &str) -> Option<Secret> {
        self.inner.read().self_keys.get(public_key).cloned()
    }

    pub fn lookup_delegated_key(&self, public_key: &str) -> Option<Secret> {
        self.inner.read().delegated_keys.get(public_key).cloned()
    }

    /// Total number of registered keys across both namespaces
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.self_keys.len() + inner.delegated_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
