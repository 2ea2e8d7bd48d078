//! # Job Builder
//!
//! Turns a service's job manifest into the Nomad job document. The manifest
//! is the JSON file shipped inside the deployment artifact at
//! `<root>/<service>/<service>.nomad`; reading it sits behind the
//! [`JobSource`] capability so tests can substitute prepared documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::api::{
    nanos, Constraint, Job, Resources, Service, ServiceCheck, Task, TaskGroup, UpdateStrategy,
};

const JOB_REGION: &str = "eu";
const JOB_DATACENTER: &str = "eu-west-1";
const GROUP_PUBLISHING: &str = "publishing";
const GROUP_WEB: &str = "web";

/// Errors raised loading a job manifest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("failed to read job manifest {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse job manifest {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Deployment job manifest for a service.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct JobManifest {
    #[serde(rename = "java")]
    pub java: bool,
    #[serde(rename = "go")]
    pub go: bool,
    #[serde(rename = "publishing")]
    pub publishing: Option<GroupSpec>,
    #[serde(rename = "web")]
    pub web: Option<GroupSpec>,
    #[serde(rename = "healthcheck")]
    pub healthcheck: Option<HealthcheckSpec>,
    #[serde(rename = "Revision")]
    pub revision: String,
}

/// Shape of one task group in the manifest.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GroupSpec {
    #[serde(rename = "mount")]
    pub mount: bool,
    #[serde(rename = "distinct_hosts")]
    pub distinct_hosts: bool,
    #[serde(rename = "volumes")]
    pub volumes: Vec<String>,
    #[serde(rename = "userns_mode")]
    pub userns_mode: bool,
    #[serde(rename = "command_line_args")]
    pub command_line_args: Vec<String>,
    #[serde(rename = "CPU")]
    pub cpu: i32,
    #[serde(rename = "Memory")]
    pub memory: i32,
    #[serde(rename = "TaskCount")]
    pub task_count: i32,
    #[serde(rename = "heap_memory")]
    pub heap_memory: String,
}

/// Healthcheck settings shared by all groups.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HealthcheckSpec {
    #[serde(rename = "enabled")]
    pub enabled: bool,
    #[serde(rename = "path")]
    pub path: String,
}

/// Capability interface producing the job document for a service.
pub trait JobSource: Send + Sync {
    fn job_for(&self, service: &str) -> Result<Job, ManifestError>;
}

/// Reads `<root>/<service>/<service>.nomad` and builds the job document.
#[derive(Debug, Clone)]
pub struct ManifestJobSource {
    root: PathBuf,
}

impl ManifestJobSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn manifest_path(&self, service: &str) -> PathBuf {
        self.root.join(service).join(format!("{service}.nomad"))
    }
}

impl JobSource for ManifestJobSource {
    fn job_for(&self, service: &str) -> Result<Job, ManifestError> {
        let path = self.manifest_path(service);
        let manifest = read_manifest(&path)?;
        Ok(build_job(service, &manifest))
    }
}

fn read_manifest(path: &Path) -> Result<JobManifest, ManifestError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ManifestError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Build the Nomad job document for a service from its manifest.
pub fn build_job(service: &str, manifest: &JobManifest) -> Job {
    let mut task_groups = Vec::new();
    if let Some(group) = &manifest.publishing {
        task_groups.push(build_task_group(service, GROUP_PUBLISHING, group, manifest));
    }
    if let Some(group) = &manifest.web {
        task_groups.push(build_task_group(service, GROUP_WEB, group, manifest));
    }

    Job {
        id: Some(service.to_string()),
        name: service.to_string(),
        region: JOB_REGION.to_string(),
        datacenters: vec![JOB_DATACENTER.to_string()],
        job_type: "service".to_string(),
        update: Some(update_strategy(manifest.java)),
        task_groups,
    }
}

fn update_strategy(java: bool) -> UpdateStrategy {
    // Java services need a longer stagger to ride out slow JVM startup.
    let stagger = if java { Duration::from_secs(150) } else { Duration::from_secs(60) };

    UpdateStrategy {
        stagger: nanos(stagger),
        min_healthy_time: nanos(Duration::from_secs(30)),
        healthy_deadline: nanos(Duration::from_secs(120)),
        max_parallel: 1,
        auto_revert: true,
    }
}

fn build_task_group(
    service: &str,
    group: &str,
    spec: &GroupSpec,
    manifest: &JobManifest,
) -> TaskGroup {
    let task = build_task(service, group, spec, manifest);

    let mut constraints = Vec::new();
    if spec.distinct_hosts {
        constraints.push(Constraint { operand: "distinct_hosts".to_string(), ..Default::default() });
    }

    // Mounting groups land on a dedicated node class.
    let group_name =
        if spec.mount { format!("{group}-mount") } else { group.to_string() };
    constraints.push(Constraint {
        l_target: "${node.class}".to_string(),
        r_target: group_name.clone(),
        ..Default::default()
    });

    let service_entry = build_service(service, &group_name, manifest.healthcheck.as_ref());

    TaskGroup {
        name: group_name,
        count: spec.task_count,
        constraints,
        tasks: vec![task],
        services: vec![service_entry],
    }
}

fn build_task(service: &str, group: &str, spec: &GroupSpec, manifest: &JobManifest) -> Task {
    let mut config = HashMap::new();
    config.insert(
        "image".to_string(),
        serde_json::json!(format!("{service}:{revision}", revision = manifest.revision)),
    );
    if !spec.command_line_args.is_empty() {
        config.insert("args".to_string(), serde_json::json!(spec.command_line_args));
    }
    if !spec.volumes.is_empty() {
        config.insert("volumes".to_string(), serde_json::json!(spec.volumes));
    }
    if spec.userns_mode {
        config.insert("userns_mode".to_string(), serde_json::json!("host"));
    }

    let env = if spec.heap_memory.is_empty() {
        None
    } else {
        Some(HashMap::from([("HEAP_MEMORY".to_string(), spec.heap_memory.clone())]))
    };

    Task {
        name: format!("{service}-{group}"),
        driver: "docker".to_string(),
        config,
        env,
        resources: Resources { cpu: spec.cpu, memory_mb: spec.memory },
    }
}

fn build_service(service: &str, group_name: &str, healthcheck: Option<&HealthcheckSpec>) -> Service {
    let checks = match healthcheck {
        Some(hc) if hc.enabled => vec![ServiceCheck {
            check_type: "http".to_string(),
            path: hc.path.clone(),
            interval: nanos(Duration::from_secs(10)),
            timeout: nanos(Duration::from_secs(2)),
        }],
        _ => Vec::new(),
    };

    Service {
        name: service.to_string(),
        port_label: "http".to_string(),
        tags: vec![group_name.to_string()],
        checks,
    }
}
