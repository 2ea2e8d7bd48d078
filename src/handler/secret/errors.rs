//! Error types for the secret handler.

use serde_json::json;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::storage::StorageError;
use crate::vault::VaultError;

/// Errors raised while updating secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Cancellation was observed between artifacts.
    #[error("aborted updating secrets for message")]
    Aborted { id: String },
    /// The artifact key does not yield a secret path.
    #[error("invalid secret artifact key")]
    InvalidArtifactKey { key: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] VaultError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SecretError {
    /// Structured rendering of the error, carried in the failure reply.
    pub fn data(&self) -> serde_json::Value {
        match self {
            SecretError::Aborted { id } => json!({"ID": id}),
            SecretError::InvalidArtifactKey { key } => json!({"Key": key}),
            _ => json!({}),
        }
    }
}
