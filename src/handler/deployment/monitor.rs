//! # Deployment Monitors
//!
//! Two alternative state machines watch a submitted job until it reaches a
//! terminal state. Service jobs produce a deployment record, so the
//! deployment monitor tracks the entry matching the submitted modify index.
//! System and batch jobs produce no deployment, so the allocation monitor
//! tracks the job's allocation set instead.
//!
//! Both tick once a second under a configured deadline. Cancellation yields
//! an abort, deadline expiry a timeout, and any orchestrator error is
//! returned verbatim; retries belong to the engine's reply path, not here.

use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::constants::MONITOR_INTERVAL;
use crate::engine::request::Request;
use crate::nomad::api::{JobInfo, JobRegisterResponse};

use super::{DeploymentError, DeploymentHandler};

const STATUS_SUCCESSFUL: &str = "successful";
const STATUS_FAILED: &str = "failed";
const STATUS_CANCELLED: &str = "cancelled";
const DESIRED_RUN: &str = "run";
const CLIENT_RUNNING: &str = "running";

const JOB_TYPE_SYSTEM: &str = "system";
const JOB_TYPE_BATCH: &str = "batch";

impl DeploymentHandler {
    pub(super) async fn monitor(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        submitted: &JobRegisterResponse,
        info: &JobInfo,
    ) -> Result<(), DeploymentError> {
        match info.job_type.as_str() {
            JOB_TYPE_SYSTEM | JOB_TYPE_BATCH => {
                self.watch_allocations(cancel, request, submitted, info.version).await
            }
            _ => self.watch_deployment(cancel, request, submitted).await,
        }
    }

    /// Poll the job's deployment list until the entry for the submitted
    /// revision is terminal.
    async fn watch_deployment(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        submitted: &JobRegisterResponse,
    ) -> Result<(), DeploymentError> {
        let mut ticker = interval_at(Instant::now() + MONITOR_INTERVAL, MONITOR_INTERVAL);
        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(evaluation = %submitted.eval_id, "bailing on deployment status");
                    return Err(self.aborted(request, submitted));
                }
                _ = &mut deadline => {
                    return Err(DeploymentError::Timeout { action: "deployment".to_string() });
                }
                _ = ticker.tick() => {
                    let deployments = self.nomad.deployments(&request.service).await?;
                    let matching = deployments
                        .iter()
                        .find(|d| d.job_spec_modify_index == submitted.job_modify_index);

                    let Some(deployment) = matching else {
                        trace!("no deployment for submitted revision yet");
                        continue;
                    };

                    match deployment.status.as_str() {
                        STATUS_SUCCESSFUL => {
                            trace!(
                                status_desc = %deployment.status_description,
                                "deployment success"
                            );
                            return Ok(());
                        }
                        STATUS_FAILED | STATUS_CANCELLED => {
                            trace!(status = %deployment.status, "deployment failed");
                            return Err(self.aborted(request, submitted));
                        }
                        other => trace!(status = %other, "deployment incomplete - will re-test"),
                    }
                }
            }
        }
    }

    /// Poll the job's allocations until every desired-run allocation runs the
    /// submitted version.
    async fn watch_allocations(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        submitted: &JobRegisterResponse,
        job_version: u64,
    ) -> Result<(), DeploymentError> {
        let mut ticker = interval_at(Instant::now() + MONITOR_INTERVAL, MONITOR_INTERVAL);
        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(evaluation = %submitted.eval_id, "bailing on allocation status");
                    return Err(self.aborted(request, submitted));
                }
                _ = &mut deadline => {
                    return Err(DeploymentError::Timeout { action: "deployment".to_string() });
                }
                _ = ticker.tick() => {
                    let allocations = self.nomad.allocations(&request.service).await?;
                    if allocations.is_empty() {
                        return Err(self.aborted(request, submitted));
                    }

                    // An allocation marked for stop that is still running
                    // means the rollout has not converged.
                    let stop_pending = allocations
                        .iter()
                        .any(|a| a.desired_status != DESIRED_RUN && a.client_status == CLIENT_RUNNING);
                    if stop_pending {
                        trace!("stop-pending allocation still running - will re-test");
                        continue;
                    }

                    let desired = allocations
                        .iter()
                        .filter(|a| a.desired_status == DESIRED_RUN)
                        .count();
                    let converged = allocations
                        .iter()
                        .filter(|a| {
                            a.desired_status == DESIRED_RUN
                                && a.job_version == job_version
                                && a.client_status == CLIENT_RUNNING
                        })
                        .count();

                    if converged == desired {
                        trace!(count = converged, "allocations running submitted version");
                        return Ok(());
                    }
                    trace!(converged, desired, "allocations incomplete - will re-test");
                }
            }
        }
    }

    fn aborted(&self, request: &Request, submitted: &JobRegisterResponse) -> DeploymentError {
        DeploymentError::Aborted {
            evaluation_id: submitted.eval_id.clone(),
            correlation_id: request.id.clone(),
        }
    }
}
