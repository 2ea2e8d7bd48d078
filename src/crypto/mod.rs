//! # OpenPGP Keyrings
//!
//! Armored keyring loading plus the two operations the worker needs:
//! clearsign envelope verification and message decryption. Keyrings are
//! parsed once at startup and are read-only afterwards, so they are safe to
//! share across handler tasks.

use pgp::composed::cleartext::CleartextSignedMessage;
use pgp::{Deserializable, Message, SignedPublicKey, SignedSecretKey};
use thiserror::Error;
use tracing::trace;

/// Errors raised by keyring construction, verification and decryption.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid armored keyring: {0}")]
    Keyring(String),
    #[error("invalid clearsign block")]
    MalformedBlock,
    #[error("{0}")]
    Signature(String),
    #[error("failed to decrypt message: {0}")]
    Decrypt(String),
    #[error("decrypted message has no content")]
    EmptyMessage,
}

/// Public keyring used to verify clearsigned envelopes.
#[derive(Debug)]
pub struct VerificationKeyring {
    keys: Vec<SignedPublicKey>,
}

impl VerificationKeyring {
    /// Parse an armored public key block.
    pub fn from_armored(armored: &str) -> Result<Self, CryptoError> {
        let (key, _) = SignedPublicKey::from_string(armored)
            .map_err(|e| CryptoError::Keyring(e.to_string()))?;
        Ok(Self { keys: vec![key] })
    }

    /// Verify a clearsigned body and return the signed plaintext.
    ///
    /// A body that does not parse as a clearsign block fails with
    /// [`CryptoError::MalformedBlock`]; a signature that does not match any
    /// keyring entry surfaces the verification error verbatim.
    pub fn verify_clearsigned(&self, body: &str) -> Result<Vec<u8>, CryptoError> {
        let (message, _) = CleartextSignedMessage::from_string(body)
            .map_err(|_| CryptoError::MalformedBlock)?;

        let mut last_error = None;
        for key in &self.keys {
            match message.verify(key) {
                Ok(_) => {
                    trace!("envelope signature verified");
                    return Ok(message.signed_text().into_bytes());
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(CryptoError::Signature(
            last_error.map(|e| e.to_string()).unwrap_or_else(|| "empty keyring".to_string()),
        ))
    }
}

/// Private keyring used to decrypt secret artifacts.
pub struct DecryptionKeyring {
    keys: Vec<SignedSecretKey>,
}

impl DecryptionKeyring {
    /// Parse an armored private key block.
    pub fn from_armored(armored: &str) -> Result<Self, CryptoError> {
        let (key, _) = SignedSecretKey::from_string(armored)
            .map_err(|e| CryptoError::Keyring(e.to_string()))?;
        Ok(Self { keys: vec![key] })
    }

    /// Decrypt an armored OpenPGP message and return its literal content.
    pub fn decrypt(&self, armored: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let armored = std::str::from_utf8(armored)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        let (message, _) =
            Message::from_string(armored).map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        let keys: Vec<&SignedSecretKey> = self.keys.iter().collect();
        let (decrypted, _) = message
            .decrypt(String::new, &keys)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        decrypted
            .get_content()
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?
            .ok_or(CryptoError::EmptyMessage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFICATION_KEY: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/verification_key.asc"));
    const OTHER_KEY: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/other_key.asc"));
    const CLEARSIGNED: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/clearsigned_test.asc"));
    const PRIVATE_KEY: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/private_key.asc"));
    const SECRET_MESSAGE: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/secret_message.asc"));

    #[test]
    fn verifies_clearsigned_body_against_keyring() {
        let keyring = VerificationKeyring::from_armored(VERIFICATION_KEY).unwrap();

        let plaintext = keyring.verify_clearsigned(CLEARSIGNED).unwrap();
        let plaintext = String::from_utf8(plaintext).unwrap();
        assert!(plaintext.contains(r#""Type":"test""#));
    }

    #[test]
    fn rejects_signature_from_unknown_key() {
        let keyring = VerificationKeyring::from_armored(OTHER_KEY).unwrap();

        let err = keyring.verify_clearsigned(CLEARSIGNED).unwrap_err();
        assert!(matches!(err, CryptoError::Signature(_)));
    }

    #[test]
    fn rejects_body_without_clearsign_wrapper() {
        let keyring = VerificationKeyring::from_armored(VERIFICATION_KEY).unwrap();

        let err = keyring.verify_clearsigned(r#"{"Type":"test"}"#).unwrap_err();
        assert_eq!(err, CryptoError::MalformedBlock);
    }

    #[test]
    fn rejects_garbage_keyring() {
        let err = VerificationKeyring::from_armored("not a key").unwrap_err();
        assert!(matches!(err, CryptoError::Keyring(_)));
    }

    #[test]
    fn decrypts_armored_message() {
        let keyring = DecryptionKeyring::from_armored(PRIVATE_KEY).unwrap();

        let plaintext = keyring.decrypt(SECRET_MESSAGE.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(value["username"], "admin");
        assert_eq!(value["threshold"], 5);
    }

    #[test]
    fn decrypt_rejects_garbage_input() {
        let keyring = DecryptionKeyring::from_armored(PRIVATE_KEY).unwrap();

        let err = keyring.decrypt(b"not an armored message").unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt(_)));
    }
}
