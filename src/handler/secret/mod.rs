//! # Secret Handler
//!
//! Walks a request's artifact list in order: fetch the encrypted blob,
//! decrypt it with the configured private keyring, decode the key/value
//! payload and write it to the secret store under a path derived from the
//! artifact key. Any failure fails the whole request; there is no
//! partial-success reply.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::crypto::DecryptionKeyring;
use crate::engine::request::Request;
use crate::storage::ObjectStore;
use crate::vault::SecretStore;

use super::{HandlerError, MessageHandler};

mod errors;

pub use errors::SecretError;

/// Handles `secret` messages.
pub struct SecretHandler {
    store: Arc<dyn ObjectStore>,
    keyring: DecryptionKeyring,
    secrets: Arc<dyn SecretStore>,
}

impl SecretHandler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        keyring: DecryptionKeyring,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self { store, keyring, secrets }
    }

    async fn run(&self, cancel: &CancellationToken, request: &Request) -> Result<(), SecretError> {
        for artifact in &request.artifacts {
            if cancel.is_cancelled() {
                info!("bailing on updating secrets");
                return Err(SecretError::Aborted { id: request.id.clone() });
            }

            let object = self.store.get(&request.bucket, artifact).await?;
            let mut reader = object.reader;
            let mut armored = Vec::new();
            reader.read_to_end(&mut armored).await?;
            drop(reader);

            let plaintext = self.keyring.decrypt(&armored)?;
            let payload: serde_json::Map<String, serde_json::Value> =
                serde_json::from_slice(&plaintext)?;

            let path = format!("secret/{}", path_for(artifact)?);
            debug!(artifact = %artifact, "writing secret");
            self.secrets.write(&path, &payload).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for SecretHandler {
    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: &Request,
    ) -> Result<(), HandlerError> {
        self.run(cancel, request).await.map_err(HandlerError::from)
    }
}

/// Derive the secret leaf from an artifact key: the second `/` segment with
/// its extension stripped. `a/b.json` yields `b`.
fn path_for(artifact: &str) -> Result<&str, SecretError> {
    let invalid = || SecretError::InvalidArtifactKey { key: artifact.to_string() };

    let segment = artifact.split('/').nth(1).ok_or_else(invalid)?;
    let leaf = segment.split('.').next().ok_or_else(invalid)?;
    if leaf.is_empty() {
        return Err(invalid());
    }
    Ok(leaf)
}
