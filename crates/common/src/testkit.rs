//! Test doubles for the crypto primitives
//!
//! - [`TableCipher`]: decrypts from a fixed `(ciphertext, key) -> plaintext`
//!   table, for tests that want literal ciphertext such as `SEA{xxx}`
//! - [`CountingCipher`]: wraps any cipher and counts primitive invocations,
//!   for asserting cache behavior

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::crypto::{Cipher, CipherError, Envelope, SeaCipher, Secret, SecretKey, SignedEnvelope};
use crate::graph::Scalar;

#[derive(Debug, Default)]
pub struct TableCipher {
    table: HashMap<(String, String), Scalar>,
}

impl TableCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        ciphertext: &str,
        key: &Secret,
        plaintext: impl Into<Scalar>,
    ) -> Self {
        self.table
            .insert((ciphertext.to_string(), key.to_hex()), plaintext.into());
        self
    }
}

#[async_trait]
impl Cipher for TableCipher {
    async fn decrypt(&self, ciphertext: &str, key: &Secret) -> Result<Scalar, CipherError> {
        self.table
            .get(&(ciphertext.to_string(), key.to_hex()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no table entry for ciphertext").into())
    }

    async fn encrypt(&self, plaintext: &Scalar, key: &Secret) -> Result<String, CipherError> {
        SeaCipher.encrypt(plaintext, key).await
    }

    async fn sign(
        &self,
        envelope: Envelope,
        key: &SecretKey,
    ) -> Result<SignedEnvelope, CipherError> {
        SeaCipher.sign(envelope, key).await
    }
}

#[derive(Debug, Default)]
pub struct CountingCipher<C> {
    inner: C,
    decrypts: AtomicUsize,
    encrypts: AtomicUsize,
    signs: AtomicUsize,
}

impl<C: Cipher> CountingCipher<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            decrypts: AtomicUsize::new(0),
            encrypts: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Cipher> Cipher for CountingCipher<C> {
    async fn decrypt(&self, ciphertext: &str, key: &Secret) -> Result<Scalar, CipherError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext, key).await
    }

    async fn encrypt(&self, plaintext: &Scalar, key: &Secret) -> Result<String, CipherError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(plaintext, key).await
    }

    async fn sign(
        &self,
        envelope: Envelope,
        key: &SecretKey,
    ) -> Result<SignedEnvelope, CipherError> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(envelope, key).await
    }
}
