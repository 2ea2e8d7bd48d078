//! # Nomad HTTP Client
//!
//! Thin client over the Nomad HTTP API. Every request carries
//! `Content-Type: application/json` and, when configured, the ACL token
//! header; any non-200 response maps to a typed client-response error that
//! carries the body, status code and URL.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::config::Config;
use crate::constants::HTTP_CLIENT_TIMEOUT;

use super::api::{
    Allocation, DeploymentStatus, Job, JobInfo, JobPayload, JobPlanResponse, JobRegisterResponse,
};

const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Errors raised by the Nomad client.
#[derive(Debug, Error)]
pub enum NomadError {
    /// Client construction failed, including the https-without-trust case.
    #[error("invalid nomad client configuration: {0}")]
    Config(String),
    /// The orchestrator answered with a non-200 status.
    #[error("unexpected response from client")]
    ClientResponse { body: String, status_code: u16, url: String },
    /// The request did not complete.
    #[error("nomad request failed: {0}")]
    Transport(String),
    /// The response body did not decode into the expected document.
    #[error("failed to decode nomad response: {0}")]
    Decode(String),
}

/// HTTP client for the Nomad API.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NomadClient {
    /// Build a client from configuration.
    ///
    /// An https endpoint requires either a CA bundle or the explicit
    /// skip-verify opt-in; neither is a configuration error.
    pub fn from_config(config: &Config) -> Result<Self, NomadError> {
        Self::new(
            &config.nomad_endpoint,
            &config.nomad_token,
            &config.nomad_ca_cert,
            config.nomad_tls_skip_verify,
        )
    }

    pub fn new(
        endpoint: &str,
        token: &str,
        ca_cert: &str,
        tls_skip_verify: bool,
    ) -> Result<Self, NomadError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !token.is_empty() {
            let value = HeaderValue::from_str(token)
                .map_err(|e| NomadError::Config(format!("invalid acl token: {e}")))?;
            headers.insert(TOKEN_HEADER, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(HTTP_CLIENT_TIMEOUT)
            .default_headers(headers);

        if endpoint.starts_with("https://") {
            if !ca_cert.is_empty() {
                trace!(ca_cert_path = %ca_cert, "loading custom ca cert");
                let pem = std::fs::read(ca_cert)
                    .map_err(|e| NomadError::Config(format!("unreadable ca cert: {e}")))?;
                let certificate = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| NomadError::Config(format!("invalid ca cert: {e}")))?;
                builder = builder.add_root_certificate(certificate);
            } else if tls_skip_verify {
                trace!("using TLS without verification");
                builder = builder.danger_accept_invalid_certs(true);
            } else {
                return Err(NomadError::Config(
                    "https endpoint requires a ca cert or skip-verify opt-in".to_string(),
                ));
            }
        }

        let http = builder.build().map_err(|e| NomadError::Config(e.to_string()))?;
        Ok(Self { http, endpoint: endpoint.trim_end_matches('/').to_string() })
    }

    /// `POST /v1/job/{id}/plan`
    pub async fn plan_job(
        &self,
        service: &str,
        job: &Job,
    ) -> Result<JobPlanResponse, NomadError> {
        let url = format!("{}/v1/job/{}/plan", self.endpoint, service);
        self.post_json(&url, &JobPayload { job }).await
    }

    /// `POST /v1/jobs`
    pub async fn submit_job(&self, job: &Job) -> Result<JobRegisterResponse, NomadError> {
        let url = format!("{}/v1/jobs", self.endpoint);
        self.post_json(&url, &JobPayload { job }).await
    }

    /// `GET /v1/job/{id}`
    pub async fn job_info(&self, service: &str) -> Result<JobInfo, NomadError> {
        let url = format!("{}/v1/job/{}", self.endpoint, service);
        self.get_json(&url).await
    }

    /// `GET /v1/job/{id}/deployments`
    pub async fn deployments(&self, service: &str) -> Result<Vec<DeploymentStatus>, NomadError> {
        let url = format!("{}/v1/job/{}/deployments", self.endpoint, service);
        self.get_json(&url).await
    }

    /// `GET /v1/job/{id}/allocations`
    pub async fn allocations(&self, service: &str) -> Result<Vec<Allocation>, NomadError> {
        let url = format!("{}/v1/job/{}/allocations", self.endpoint, service);
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NomadError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| NomadError::Transport(e.to_string()))?;
        Self::decode_response(url, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T, NomadError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| NomadError::Transport(e.to_string()))?;
        Self::decode_response(url, response).await
    }

    async fn decode_response<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, NomadError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NomadError::Transport(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            return Err(NomadError::ClientResponse {
                body,
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| NomadError::Decode(e.to_string()))
    }
}
