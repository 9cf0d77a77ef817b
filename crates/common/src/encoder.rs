//! Write encoder
//!
//! Prepares a plaintext field write for the store transport. With an
//! encryption key the scalar is sealed (and the pairing pre-seeded into the
//! decryption cache so the echo decodes for free); with a signing key the
//! result is wrapped in a signed envelope. With neither it goes out as-is.

use crate::cache::DecryptionCache;
use crate::crypto::{Cipher, CipherError, Envelope, KeyMaterial, Secret};
use crate::decoder::OWNER_ENCRYPTION_KEY_FIELD;
use crate::graph::{Scalar, Value};

#[derive(Debug)]
pub struct WriteEncoder<'a, C: Cipher + ?Sized> {
    cache: &'a DecryptionCache,
    cipher: &'a C,
}

impl<'a, C: Cipher + ?Sized> WriteEncoder<'a, C> {
    pub fn new(cache: &'a DecryptionCache, cipher: &'a C) -> Self {
        Self { cache, cipher }
    }

    /// Encode one write to `id.field`
    ///
    /// `state` is the store's logical timestamp for the write; it is only
    /// recorded when the write is signed.
    pub async fn encode_write(
        &self,
        id: &str,
        field: &str,
        value: Value,
        keys: Option<&KeyMaterial>,
        state: u64,
    ) -> Result<Value, CipherError> {
        let Some(keys) = keys else {
            return Ok(value);
        };

        let value = match (value, self.sealing_key(keys, field)) {
            (Value::Scalar(plaintext), Some(key)) if !plaintext.is_blank() => {
                let ciphertext = self.cipher.encrypt(&plaintext, key).await?;
                self.cache.insert(ciphertext.as_str(), plaintext);
                Value::Scalar(Scalar::Text(ciphertext))
            }
            (value, _) => value,
        };

        let Some(signing) = &keys.signing else {
            return Ok(value);
        };
        let envelope = Envelope {
            id: id.to_string(),
            field: field.to_string(),
            value,
            state,
        };
        let signed = self.cipher.sign(envelope, signing).await?;
        Ok(Value::text(signed.to_wire()?))
    }

    fn sealing_key<'k>(&self, keys: &'k KeyMaterial, field: &str) -> Option<&'k Secret> {
        if field == OWNER_ENCRYPTION_KEY_FIELD {
            keys.delegation_key()
        } else {
            keys.field_key()
        }
    }
}
