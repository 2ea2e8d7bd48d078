//! # Health Endpoint
//!
//! Minimal HTTP surface served beside the engine: `GET /health` reports
//! process liveness and uptime. Shares the root cancellation token so it
//! shuts down with the engine.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
struct AppState {
    started_at: Instant,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    uptime_seconds: u64,
}

/// Build the health router.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(AppState { started_at: Instant::now() })
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus { status: "OK", uptime_seconds: state.started_at.elapsed().as_secs() })
}

/// Serve the health endpoint until `shutdown` fires.
///
/// Accepts Go-style `:port` bind addresses as well as full socket addresses.
pub async fn serve(bind_addr: &str, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = parse_bind_addr(bind_addr)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "health endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn parse_bind_addr(bind_addr: &str) -> std::io::Result<SocketAddr> {
    let normalized = if bind_addr.starts_with(':') {
        format!("0.0.0.0{bind_addr}")
    } else {
        bind_addr.to_string()
    };
    normalized
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}")))
}
