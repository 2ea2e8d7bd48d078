//! Nomad API documents.
//!
//! Field names follow Nomad's JSON API; durations are nanoseconds, as the
//! API expects. Only the parts of the surface the worker touches are
//! modelled; unknown response fields are ignored on decode.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A job document as submitted to `/v1/jobs` and `/v1/job/{id}/plan`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Job {
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Datacenters")]
    pub datacenters: Vec<String>,
    #[serde(rename = "Type")]
    pub job_type: String,
    #[serde(rename = "Update", skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStrategy>,
    #[serde(rename = "TaskGroups")]
    pub task_groups: Vec<TaskGroup>,
}

/// Rolling-update strategy for a job.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateStrategy {
    #[serde(rename = "Stagger")]
    pub stagger: i64,
    #[serde(rename = "MinHealthyTime")]
    pub min_healthy_time: i64,
    #[serde(rename = "HealthyDeadline")]
    pub healthy_deadline: i64,
    #[serde(rename = "MaxParallel")]
    pub max_parallel: i32,
    #[serde(rename = "AutoRevert")]
    pub auto_revert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskGroup {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Count")]
    pub count: i32,
    #[serde(rename = "Constraints")]
    pub constraints: Vec<Constraint>,
    #[serde(rename = "Tasks")]
    pub tasks: Vec<Task>,
    #[serde(rename = "Services")]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Constraint {
    #[serde(rename = "LTarget", skip_serializing_if = "String::is_empty", default)]
    pub l_target: String,
    #[serde(rename = "RTarget", skip_serializing_if = "String::is_empty", default)]
    pub r_target: String,
    #[serde(rename = "Operand", skip_serializing_if = "String::is_empty", default)]
    pub operand: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Task {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Config")]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(rename = "Env", skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(rename = "Resources")]
    pub resources: Resources,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Resources {
    #[serde(rename = "CPU")]
    pub cpu: i32,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Service {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PortLabel")]
    pub port_label: String,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Checks")]
    pub checks: Vec<ServiceCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceCheck {
    #[serde(rename = "Type")]
    pub check_type: String,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Interval")]
    pub interval: i64,
    #[serde(rename = "Timeout")]
    pub timeout: i64,
}

/// Envelope for job submission and planning: `{"Job": <document>}`.
#[derive(Debug, Serialize)]
pub struct JobPayload<'a> {
    #[serde(rename = "Job")]
    pub job: &'a Job,
}

/// Response from `POST /v1/job/{id}/plan`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobPlanResponse {
    #[serde(rename = "Warnings", default)]
    pub warnings: String,
    #[serde(rename = "FailedTGAllocs", default)]
    pub failed_tg_allocs: Option<HashMap<String, serde_json::Value>>,
}

/// Response from `POST /v1/jobs`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,
}

/// Response from `GET /v1/job/{id}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobInfo {
    #[serde(rename = "Type", default)]
    pub job_type: String,
    #[serde(rename = "Version", default)]
    pub version: u64,
}

/// One entry of `GET /v1/job/{id}/deployments`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeploymentStatus {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "JobSpecModifyIndex", default)]
    pub job_spec_modify_index: u64,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "StatusDescription", default)]
    pub status_description: String,
}

/// One entry of `GET /v1/job/{id}/allocations`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Allocation {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "JobVersion", default)]
    pub job_version: u64,
    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,
    #[serde(rename = "DesiredStatus", default)]
    pub desired_status: String,
}

/// Convert a duration to the nanosecond integers Nomad expects.
pub(crate) fn nanos(duration: Duration) -> i64 {
    duration.as_nanos() as i64
}
