//! # Secret Store
//!
//! Capability interface over the secret store plus the Vault implementation:
//! a logical write of a JSON object to `{addr}/v1/{path}`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::constants::HTTP_CLIENT_TIMEOUT;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Errors raised writing secrets.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid secret store configuration: {0}")]
    Config(String),
    #[error("secret store request failed: {0}")]
    Transport(String),
    #[error("unexpected response from secret store: {status_code}")]
    Response { status_code: u16 },
}

/// Capability interface over the secret store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Write a key/value payload at the given path.
    async fn write(
        &self,
        path: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), VaultError>;
}

/// Vault-backed [`SecretStore`].
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
    token: String,
}

impl VaultClient {
    pub fn new(address: &str, token: &str) -> Result<Self, VaultError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_CLIENT_TIMEOUT)
            .build()
            .map_err(|e| VaultError::Config(e.to_string()))?;

        Ok(Self {
            http,
            address: address.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    async fn write(
        &self,
        path: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), VaultError> {
        let url = format!("{}/v1/{}", self.address, path);

        let response = self
            .http
            .put(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(data)
            .send()
            .await
            .map_err(|e| VaultError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::Response { status_code: status.as_u16() });
        }

        debug!(path = %path, "secret written");
        Ok(())
    }
}
