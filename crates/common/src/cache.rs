//! Decryption cache
//!
//! Memoizes ciphertext -> plaintext so the same ciphertext, delivered again by
//! another peer or another field notification, is decrypted at most once.
//! Ciphertext is unique per encryption (random nonce), so the cache is keyed
//! on the wire text alone and never needs invalidation. Only successes are
//! stored: a ciphertext that fails today may decrypt once its key arrives.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::Scalar;

#[derive(Debug, Clone, Default)]
pub struct DecryptionCache {
    inner: Arc<RwLock<HashMap<String, Scalar>>>,
}

impl DecryptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ciphertext: &str) -> Option<Scalar> {
        self.inner.read().get(ciphertext).cloned()
    }

    /// Record a known pairing, e.g. a value this session just encrypted
    pub fn insert(&self, ciphertext: impl Into<String>, plaintext: Scalar) {
        self.inner.write().insert(ciphertext.into(), plaintext);
    }

    /// Return the memoized plaintext or run `compute` and memoize its success
    ///
    /// The lock is not held while `compute` runs.
    pub async fn get_or_try_compute<F, Fut, E>(
        &self,
        ciphertext: &str,
        compute: F,
    ) -> Result<Scalar, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Scalar, E>>,
    {
        if let Some(plaintext) = self.get(ciphertext) {
            tracing::trace!("decryption cache hit");
            return Ok(plaintext);
        }

        let plaintext = compute().await?;
        self.insert(ciphertext, plaintext.clone());
        Ok(plaintext)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
