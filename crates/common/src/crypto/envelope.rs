use serde::{Deserialize, Serialize};

use super::keys::{PublicKey, SecretKey};
use crate::graph::Value;

/// Wire prefix of a signed field value
pub const SIGNED_PREFIX: &str = "SIG{";

/// Errors raised while producing or checking a signed envelope
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("not a signed envelope")]
    NotSigned,
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("malformed signer key")]
    BadSigner,
    #[error("malformed signature")]
    BadSignature,
    #[error("signature does not verify")]
    Invalid,
}

/// A single field write: which entity, which field, what value, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "#")]
    pub id: String,
    #[serde(rename = ".")]
    pub field: String,
    #[serde(rename = ":")]
    pub value: Value,
    /// Logical timestamp from the store's clock
    #[serde(rename = ">")]
    pub state: u64,
}

impl Envelope {
    /// The bytes covered by the signature
    fn signing_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// An [`Envelope`] with a detached Ed25519 signature and the signer's key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(rename = "m")]
    pub envelope: Envelope,
    #[serde(rename = "s")]
    signature: String,
    #[serde(rename = "k")]
    signer: String,
}

impl SignedEnvelope {
    pub fn sign(envelope: Envelope, key: &SecretKey) -> Result<Self, EnvelopeError> {
        let signature = key.sign(&envelope.signing_bytes()?);
        Ok(Self {
            envelope,
            signature: hex::encode(signature.to_bytes()),
            signer: key.public().to_hex(),
        })
    }

    /// Hex form of the signer's public key
    pub fn signer(&self) -> &str {
        &self.signer
    }

    /// Check the signature against the embedded signer key
    pub fn verify(&self) -> Result<PublicKey, EnvelopeError> {
        let signer = PublicKey::from_hex(&self.signer).map_err(|_| EnvelopeError::BadSigner)?;
        let bytes = hex::decode(&self.signature).map_err(|_| EnvelopeError::BadSignature)?;
        let signature = ed25519_dalek::Signature::from_slice(&bytes)
            .map_err(|_| EnvelopeError::BadSignature)?;
        signer
            .verify(&self.envelope.signing_bytes()?, &signature)
            .map_err(|_| EnvelopeError::Invalid)?;
        Ok(signer)
    }

    pub fn is_signed(text: &str) -> bool {
        text.starts_with(SIGNED_PREFIX)
    }

    /// `SIG{...}`: the prefix's brace opens the JSON body
    pub fn to_wire(&self) -> Result<String, EnvelopeError> {
        Ok(format!("SIG{}", serde_json::to_string(self)?))
    }

    pub fn from_wire(text: &str) -> Result<Self, EnvelopeError> {
        if !Self::is_signed(text) {
            return Err(EnvelopeError::NotSigned);
        }
        Ok(serde_json::from_str(&text[SIGNED_PREFIX.len() - 1..])?)
    }
}
