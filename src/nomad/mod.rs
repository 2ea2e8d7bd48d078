//! Nomad integration: API documents, HTTP client and the job builder.

pub mod api;
pub mod client;
pub mod job;

pub use api::{
    Allocation, DeploymentStatus, Job, JobInfo, JobPlanResponse, JobRegisterResponse,
};
pub use client::{NomadClient, NomadError};
pub use job::{build_job, JobManifest, JobSource, ManifestError, ManifestJobSource};
