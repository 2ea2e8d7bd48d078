//! Signed-envelope verification.
//!
//! Every consumed body passes through an [`EnvelopeVerifier`] before any
//! other processing; the engine never decodes plaintext that did not come
//! out of `verify`.

use crate::crypto::{CryptoError, VerificationKeyring};
use crate::messaging::QueueMessage;

use super::errors::DispatchError;

/// Capability interface for envelope verification.
pub trait EnvelopeVerifier: Send + Sync {
    /// Authenticate a raw body, returning the signed plaintext.
    fn verify(&self, message: &QueueMessage) -> Result<Vec<u8>, DispatchError>;
}

/// Production verifier: OpenPGP clearsign against a public keyring.
pub struct ClearsignVerifier {
    keyring: VerificationKeyring,
}

impl ClearsignVerifier {
    pub fn from_armored(armored: &str) -> Result<Self, CryptoError> {
        Ok(Self { keyring: VerificationKeyring::from_armored(armored)? })
    }
}

impl EnvelopeVerifier for ClearsignVerifier {
    fn verify(&self, message: &QueueMessage) -> Result<Vec<u8>, DispatchError> {
        self.keyring.verify_clearsigned(&message.body).map_err(|e| match e {
            CryptoError::MalformedBlock => {
                DispatchError::InvalidBlock { message_id: message.id.clone() }
            }
            other => DispatchError::Verification { reason: other.to_string() },
        })
    }
}
