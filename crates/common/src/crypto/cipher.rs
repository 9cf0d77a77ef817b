use async_trait::async_trait;

use super::envelope::{Envelope, EnvelopeError, SignedEnvelope};
use super::keys::SecretKey;
use super::secret::{Secret, SecretError};
use crate::graph::Scalar;

/// Wire prefix of an encrypted field value
pub const CIPHERTEXT_PREFIX: &str = "SEA{";
const CIPHERTEXT_SUFFIX: &str = "}";

/// True iff `text` is tagged as ciphertext
pub fn is_ciphertext(text: &str) -> bool {
    text.starts_with(CIPHERTEXT_PREFIX)
}

/// Errors surfaced by the crypto primitives
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("cipher error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("value is not ciphertext")]
    NotCiphertext,
    #[error("decryption produced an empty plaintext")]
    EmptyPlaintext,
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("plaintext encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// The symmetric and signing primitives the reconciliation core relies on
///
/// Implementations may be slow (hardware tokens, worker pools); every call
/// is awaited one field at a time.
#[async_trait]
pub trait Cipher: Send + Sync + std::fmt::Debug {
    /// Decrypt a `SEA{...}` value
    ///
    /// An empty plaintext must be reported as an error.
    async fn decrypt(&self, ciphertext: &str, key: &Secret) -> Result<Scalar, CipherError>;

    /// Encrypt a scalar into its `SEA{...}` wire form
    async fn encrypt(&self, plaintext: &Scalar, key: &Secret) -> Result<String, CipherError>;

    /// Sign a write envelope
    async fn sign(
        &self,
        envelope: Envelope,
        key: &SecretKey,
    ) -> Result<SignedEnvelope, CipherError>;
}

/// Default primitives: ChaCha20-Poly1305 + Ed25519
///
/// Plaintext scalars are JSON encoded before sealing so their type survives
/// the round trip. The sealed bytes are carried as `SEA{<hex>}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaCipher;

#[async_trait]
impl Cipher for SeaCipher {
    async fn decrypt(&self, ciphertext: &str, key: &Secret) -> Result<Scalar, CipherError> {
        let body = ciphertext
            .strip_prefix(CIPHERTEXT_PREFIX)
            .and_then(|rest| rest.strip_suffix(CIPHERTEXT_SUFFIX))
            .ok_or(CipherError::NotCiphertext)?;
        let sealed =
            hex::decode(body).map_err(|_| anyhow::anyhow!("ciphertext hex decode error"))?;
        let plaintext = key.decrypt(&sealed)?;
        if plaintext.is_empty() {
            return Err(CipherError::EmptyPlaintext);
        }
        Ok(serde_json::from_slice(&plaintext)?)
    }

    async fn encrypt(&self, plaintext: &Scalar, key: &Secret) -> Result<String, CipherError> {
        let encoded = serde_json::to_vec(plaintext)?;
        let sealed = key.encrypt(&encoded)?;
        Ok(format!(
            "{}{}{}",
            CIPHERTEXT_PREFIX,
            hex::encode(sealed),
            CIPHERTEXT_SUFFIX
        ))
    }

    async fn sign(
        &self,
        envelope: Envelope,
        key: &SecretKey,
    ) -> Result<SignedEnvelope, CipherError> {
        Ok(SignedEnvelope::sign(envelope, key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_keeps_type() {
        let cipher = SeaCipher;
        let key = Secret::generate();

        for scalar in [
            Scalar::Text("hello".to_string()),
            Scalar::from(4.5),
            Scalar::Bool(false),
            Scalar::Text(String::new()),
        ] {
            let ciphertext = cipher.encrypt(&scalar, &key).await.unwrap();
            assert!(is_ciphertext(&ciphertext));
            assert_eq!(cipher.decrypt(&ciphertext, &key).await.unwrap(), scalar);
        }
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let cipher = SeaCipher;
        let ciphertext = cipher
            .encrypt(&Scalar::from("secret"), &Secret::generate())
            .await
            .unwrap();
        assert!(cipher.decrypt(&ciphertext, &Secret::generate()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_plaintext_is_failure() {
        let cipher = SeaCipher;
        let key = Secret::generate();
        let sealed = key.encrypt(b"").unwrap();
        let ciphertext = format!("SEA{{{}}}", hex::encode(sealed));
        assert!(matches!(
            cipher.decrypt(&ciphertext, &key).await,
            Err(CipherError::EmptyPlaintext)
        ));
    }

    #[tokio::test]
    async fn test_untagged_input_rejected() {
        let cipher = SeaCipher;
        assert!(matches!(
            cipher.decrypt("plain", &Secret::generate()).await,
            Err(CipherError::NotCiphertext)
        ));
    }
}
