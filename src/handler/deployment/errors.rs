//! Error types for the deployment handler.

use serde_json::json;
use thiserror::Error;

use crate::nomad::{ManifestError, NomadError};
use crate::storage::StorageError;

/// Errors raised while planning, submitting or monitoring a deployment.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The request carried no artifact to deploy.
    #[error("deployment artifact missing from request")]
    MissingArtifact,
    /// The plan produced warnings or failed task-group allocations.
    #[error("plan for tasks generated errors or warnings")]
    Plan { service: String, warnings: String, errors: String },
    /// Monitoring was cancelled or the rollout reached a failed state.
    #[error("aborted monitoring deployment")]
    Aborted { evaluation_id: String, correlation_id: String },
    /// Monitoring exceeded the configured bound.
    #[error("timed out waiting for action to complete")]
    Timeout { action: String },
    /// Archive extraction failed.
    #[error("failed to extract deployment archive: {0}")]
    Extract(String),
    #[error(transparent)]
    Nomad(#[from] NomadError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeploymentError {
    /// Structured rendering of the error, carried in the failure reply.
    pub fn data(&self) -> serde_json::Value {
        match self {
            DeploymentError::Plan { service, warnings, errors } => {
                json!({"Errors": errors, "Service": service, "Warnings": warnings})
            }
            DeploymentError::Aborted { evaluation_id, correlation_id } => {
                json!({"EvaluationID": evaluation_id, "CorrelationID": correlation_id})
            }
            DeploymentError::Timeout { action } => json!({"Action": action}),
            DeploymentError::Nomad(NomadError::ClientResponse { body, status_code, url }) => {
                json!({"Body": body, "StatusCode": status_code, "URL": url})
            }
            _ => json!({}),
        }
    }
}
