//! Cryptographic primitives for SeaSync
//!
//! The reconciliation core treats crypto as an external collaborator behind
//! the [`Cipher`] trait. This module provides that trait and a default
//! implementation:
//!
//! - **Field encryption**: ChaCha20-Poly1305 under a 256-bit [`Secret`], carried
//!   on the wire as `SEA{<hex>}`
//! - **Write signing**: Ed25519 ([`SecretKey`]/[`PublicKey`]) over a JSON
//!   [`Envelope`], carried as `SIG{...}`
//!
//! # Key roles
//!
//! An identity seals the fields it owns with its *self* key. Key material it
//! forwards to a delegated identity is sealed with its *owner* key instead.
//! [`KeyMaterial`] bundles whichever of these a session holds, plus its
//! signing key.

mod cipher;
mod envelope;
mod keys;
mod material;
mod secret;

pub use cipher::{is_ciphertext, Cipher, CipherError, SeaCipher, CIPHERTEXT_PREFIX};
pub use ed25519_dalek::Signature;
pub use envelope::{Envelope, EnvelopeError, SignedEnvelope, SIGNED_PREFIX};
pub use keys::{KeyError, PublicKey, SecretKey};
pub use material::KeyMaterial;
pub use secret::{Secret, SecretError, SECRET_SIZE};
