use super::keys::{PublicKey, SecretKey};
use super::secret::Secret;

/// The keys a session writes with
///
/// Every part is optional. Without a signing key writes go out unsigned;
/// without an encryption key they go out in the clear. Both are valid for
/// public data.
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    /// Ed25519 key that signs write envelopes
    pub signing: Option<SecretKey>,
    /// Seals fields the identity owns
    pub encryption: Option<Secret>,
    /// Seals private key material forwarded to a delegated identity
    pub owner_encryption: Option<Secret>,
}

impl KeyMaterial {
    /// Fresh signing and self-encryption keys
    pub fn generate() -> Self {
        Self {
            signing: Some(SecretKey::generate()),
            encryption: Some(Secret::generate()),
            owner_encryption: None,
        }
    }

    pub fn with_signing(mut self, key: SecretKey) -> Self {
        self.signing = Some(key);
        self
    }

    pub fn with_encryption(mut self, key: Secret) -> Self {
        self.encryption = Some(key);
        self
    }

    pub fn with_owner_encryption(mut self, key: Secret) -> Self {
        self.owner_encryption = Some(key);
        self
    }

    /// Public identity, derived from the signing key
    pub fn public(&self) -> Option<PublicKey> {
        self.signing.as_ref().map(SecretKey::public)
    }

    /// Key for a plain field write
    pub fn field_key(&self) -> Option<&Secret> {
        self.encryption.as_ref()
    }

    /// Key for the delegated private-key field; the owner key wins when both exist
    pub fn delegation_key(&self) -> Option<&Secret> {
        self.owner_encryption.as_ref().or(self.encryption.as_ref())
    }
}
