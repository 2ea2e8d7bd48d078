//! # Deployment Handler
//!
//! Drives one deployment end to end: fetch the artifact, extract it under
//! the deployment root, plan the job against Nomad, submit it, then monitor
//! the rollout until it reaches a terminal state. Any failure is returned to
//! the dispatch engine, which replies failure for the whole request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::Config;
use crate::engine::request::Request;
use crate::nomad::api::{Job, JobRegisterResponse};
use crate::nomad::{JobSource, ManifestJobSource, NomadClient, NomadError};
use crate::storage::ObjectStore;

use super::{HandlerError, MessageHandler};

mod errors;
mod monitor;

pub use errors::DeploymentError;

/// Handles `deployment` messages.
pub struct DeploymentHandler {
    store: Arc<dyn ObjectStore>,
    nomad: NomadClient,
    jobs: Arc<dyn JobSource>,
    root: PathBuf,
    timeout: Duration,
}

impl DeploymentHandler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        nomad: NomadClient,
        jobs: Arc<dyn JobSource>,
        root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self { store, nomad, jobs, root: root.into(), timeout }
    }

    /// Build a handler from configuration, reading job manifests from the
    /// deployment root.
    pub fn from_config(config: &Config, store: Arc<dyn ObjectStore>) -> Result<Self, NomadError> {
        let nomad = NomadClient::from_config(config)?;
        let jobs = Arc::new(ManifestJobSource::new(&config.deployment_root));
        Ok(Self::new(store, nomad, jobs, &config.deployment_root, config.deployment_timeout))
    }

    async fn run(&self, cancel: &CancellationToken, request: &Request) -> Result<(), DeploymentError> {
        let artifact = request.artifacts.first().ok_or(DeploymentError::MissingArtifact)?;

        debug!(service = %request.service, artifact = %artifact, "fetching deployment artifact");
        let object = self.store.get(&request.bucket, artifact).await?;
        let mut reader = object.reader;
        let mut archive = Vec::with_capacity(object.size.unwrap_or(0).max(0) as usize);
        reader.read_to_end(&mut archive).await?;
        drop(reader);

        let destination = self.root.join(&request.service);
        extract_archive(archive, &destination).await?;

        let job = self.jobs.job_for(&request.service)?;
        self.plan(request, &job).await?;
        let submitted = self.submit(request, &job).await?;
        let info = self.nomad.job_info(&request.service).await?;

        self.monitor(cancel, request, &submitted, &info).await
    }

    async fn plan(&self, request: &Request, job: &Job) -> Result<(), DeploymentError> {
        trace!(service = %request.service, "planning job");

        let response = self.nomad.plan_job(&request.service, job).await?;
        if !response.warnings.is_empty() {
            return Err(DeploymentError::Plan {
                service: request.service.clone(),
                warnings: response.warnings,
                errors: String::new(),
            });
        }
        if let Some(failed) = response.failed_tg_allocs {
            return Err(DeploymentError::Plan {
                service: request.service.clone(),
                warnings: String::new(),
                errors: serde_json::to_string(&failed).unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn submit(
        &self,
        request: &Request,
        job: &Job,
    ) -> Result<JobRegisterResponse, DeploymentError> {
        trace!(service = %request.service, "running job");
        Ok(self.nomad.submit_job(job).await?)
    }
}

#[async_trait]
impl MessageHandler for DeploymentHandler {
    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: &Request,
    ) -> Result<(), HandlerError> {
        self.run(cancel, request).await.map_err(HandlerError::from)
    }
}

/// Extract a gzipped tar archive under `destination`.
///
/// Extraction is synchronous, so it runs on the blocking pool.
async fn extract_archive(archive: Vec<u8>, destination: &Path) -> Result<(), DeploymentError> {
    use flate2::read::GzDecoder;
    use std::io::Cursor;
    use tar::Archive;

    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let decoder = GzDecoder::new(Cursor::new(archive));
        let mut archive = Archive::new(decoder);
        archive
            .unpack(&destination)
            .map_err(|e| DeploymentError::Extract(e.to_string()))
    })
    .await
    .map_err(|e| DeploymentError::Extract(format!("extraction task panicked: {e}")))?
}
