//! # Worker Configuration
//!
//! Environment-driven configuration, loaded once at startup. A `.env` file
//! is honored when present. Key material and tokens are redacted from the
//! `Debug` rendering so the startup config log stays safe to ship.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::constants::DEFAULT_DEPLOYMENT_TIMEOUT;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

/// Process-wide configuration for the worker.
#[derive(Clone)]
pub struct Config {
    /// Name of the inbound queue.
    pub consumer_queue: String,
    /// URL of the inbound queue.
    pub consumer_queue_url: String,
    /// Name of the outbound reply queue.
    pub producer_queue: String,
    /// Region for the queue and object store clients.
    pub aws_region: String,
    /// Armored public keyring used to verify message envelopes.
    pub verification_key: String,
    /// Armored private keyring used to decrypt secret artifacts.
    pub private_key: String,
    /// Scratch root under which deployment artifacts are extracted.
    pub deployment_root: String,
    /// Nomad client endpoint.
    pub nomad_endpoint: String,
    /// ACL token for Nomad requests; empty disables the header.
    pub nomad_token: String,
    /// Path to a CA bundle for https Nomad endpoints.
    pub nomad_ca_cert: String,
    /// Disables TLS verification for Nomad requests.
    pub nomad_tls_skip_verify: bool,
    /// Bound on deployment monitoring.
    pub deployment_timeout: Duration,
    /// Bucket holding deployment artifacts.
    pub deployments_bucket: String,
    /// Bucket holding encrypted secret artifacts.
    pub secrets_bucket: String,
    /// Secret store address.
    pub vault_addr: String,
    /// Secret store token.
    pub vault_token: String,
    /// Bind address for the health endpoint.
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Split out from [`Config::load`] so tests can supply variables without
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(ConfigError::MissingVar(name)),
            }
        };
        let or_default =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let deployment_timeout = match lookup("DEPLOYMENT_TIMEOUT") {
            Some(v) => {
                let secs = v.parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                    name: "DEPLOYMENT_TIMEOUT",
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_DEPLOYMENT_TIMEOUT,
        };

        let nomad_tls_skip_verify = match lookup("NOMAD_TLS_SKIP_VERIFY") {
            Some(v) => v.parse::<bool>().map_err(|e| ConfigError::InvalidVar {
                name: "NOMAD_TLS_SKIP_VERIFY",
                reason: e.to_string(),
            })?,
            None => false,
        };

        Ok(Self {
            consumer_queue: required("CONSUMER_QUEUE")?,
            consumer_queue_url: required("CONSUMER_QUEUE_URL")?,
            producer_queue: required("PRODUCER_QUEUE")?,
            aws_region: or_default("AWS_REGION", "eu-west-1"),
            verification_key: required("VERIFICATION_KEY")?,
            private_key: required("PRIVATE_KEY")?,
            deployment_root: required("DEPLOYMENT_ROOT")?,
            nomad_endpoint: or_default("NOMAD_ENDPOINT", "http://localhost:4646"),
            nomad_token: or_default("NOMAD_TOKEN", ""),
            nomad_ca_cert: or_default("NOMAD_CA_CERT", ""),
            nomad_tls_skip_verify,
            deployment_timeout,
            deployments_bucket: or_default("DEPLOYMENTS_BUCKET", ""),
            secrets_bucket: or_default("SECRETS_BUCKET", ""),
            vault_addr: or_default("VAULT_ADDR", "http://localhost:8200"),
            vault_token: or_default("VAULT_TOKEN", ""),
            bind_addr: or_default("BIND_ADDR", ":24300"),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("consumer_queue", &self.consumer_queue)
            .field("consumer_queue_url", &self.consumer_queue_url)
            .field("producer_queue", &self.producer_queue)
            .field("aws_region", &self.aws_region)
            .field("deployment_root", &self.deployment_root)
            .field("nomad_endpoint", &self.nomad_endpoint)
            .field("nomad_tls_skip_verify", &self.nomad_tls_skip_verify)
            .field("deployment_timeout", &self.deployment_timeout)
            .field("deployments_bucket", &self.deployments_bucket)
            .field("secrets_bucket", &self.secrets_bucket)
            .field("vault_addr", &self.vault_addr)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}
