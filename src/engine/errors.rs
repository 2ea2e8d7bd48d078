//! Error types for the dispatch engine.

use serde_json::json;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::handler::HandlerError;

/// Startup-time engine errors. Fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing consumer queue name")]
    MissingConsumerQueue,
    #[error("missing consumer queue url")]
    MissingConsumerQueueUrl,
    #[error("missing producer queue name")]
    MissingProducerQueue,
    #[error("missing queue region")]
    MissingRegion,
    #[error(transparent)]
    Keyring(#[from] CryptoError),
}

/// Per-request errors. Every variant produces a failure reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The body is not a clearsign block.
    #[error("invalid clearsign block for message")]
    InvalidBlock { message_id: String },
    /// The detached signature did not verify against the keyring.
    #[error("{reason}")]
    Verification { reason: String },
    /// The verified plaintext did not decode into a request.
    #[error("{message}")]
    PayloadDecode { offset: u64, message: String },
    /// No handler is registered for the request type.
    #[error("missing handler for message")]
    MissingHandler { message_type: String },
    /// The routed handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Wrap a payload decode failure, normalizing the end-of-input case.
    pub fn payload_decode(error: &serde_json::Error) -> Self {
        let eof = matches!(error.classify(), serde_json::error::Category::Eof);
        let message = if eof {
            "unexpected end of JSON input".to_string()
        } else {
            error.to_string()
        };
        let offset = if eof { error.column() as u64 + 1 } else { error.column() as u64 };
        DispatchError::PayloadDecode { offset, message }
    }

    /// Structured rendering of the error, carried in the failure reply.
    pub fn reply_data(&self) -> serde_json::Value {
        match self {
            DispatchError::InvalidBlock { message_id } => json!({"MessageID": message_id}),
            DispatchError::Verification { reason } => json!({"Reason": reason}),
            DispatchError::PayloadDecode { offset, .. } => json!({"Offset": offset}),
            DispatchError::MissingHandler { message_type } => json!({"MessageType": message_type}),
            DispatchError::Handler(e) => e.data(),
        }
    }
}
