//! Message handlers.
//!
//! A handler receives a verified, decoded request and performs its side
//! effects. Handlers own no mutable state beyond configuration; every
//! invocation is independent, so one handler instance serves all in-flight
//! messages.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::request::Request;

pub mod deployment;
pub mod secret;

pub use deployment::{DeploymentError, DeploymentHandler};
pub use secret::{SecretError, SecretHandler};

/// Capability interface implemented by message handlers.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, cancel: &CancellationToken, request: &Request)
        -> Result<(), HandlerError>;
}

/// Error returned by a handler invocation.
///
/// The variants mirror the registered handlers; [`HandlerError::Other`]
/// exists for handlers supplied from outside this crate.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Structured rendering of the error, carried in the failure reply.
    pub fn data(&self) -> serde_json::Value {
        match self {
            HandlerError::Deployment(e) => e.data(),
            HandlerError::Secret(e) => e.data(),
            HandlerError::Other(_) => json!({}),
        }
    }
}
