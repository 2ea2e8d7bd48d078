//! Worker entry point: load configuration, wire the handlers and the
//! engine, serve the health endpoint, and run until a shutdown signal.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use deploy_worker::config::Config;
use deploy_worker::crypto::DecryptionKeyring;
use deploy_worker::engine::{Engine, HandlerRegistry};
use deploy_worker::handler::{DeploymentHandler, SecretHandler};
use deploy_worker::logging;
use deploy_worker::storage::S3ObjectStore;
use deploy_worker::vault::VaultClient;
use deploy_worker::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::load().context("failed to load configuration")?;
    info!(config = ?config, "configuration loaded");

    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .load()
        .await;
    let store = Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws)));

    let deployment = DeploymentHandler::from_config(&config, store.clone())
        .context("failed to create deployment handler")?;
    let secret = SecretHandler::new(
        store,
        DecryptionKeyring::from_armored(&config.private_key)
            .context("failed to load private keyring")?,
        Arc::new(
            VaultClient::new(&config.vault_addr, &config.vault_token)
                .context("failed to create secret store client")?,
        ),
    );

    let mut handlers = HandlerRegistry::new();
    handlers.register("deployment", Arc::new(deployment));
    handlers.register("secret", Arc::new(secret));

    let engine = Arc::new(
        Engine::from_config(&config, aws_sdk_sqs::Client::new(&aws), handlers)
            .context("failed to create engine")?,
    );

    let shutdown = CancellationToken::new();

    let web_task = tokio::spawn({
        let bind_addr = config.bind_addr.clone();
        let token = shutdown.clone();
        let cancel_on_exit = shutdown.clone();
        async move {
            if let Err(e) = web::serve(&bind_addr, token).await {
                error!(error = %e, "health endpoint failed");
                cancel_on_exit.cancel();
            }
        }
    });

    let engine_task = tokio::spawn(engine.run(shutdown.child_token()));

    shutdown_signal().await;
    info!("received exit signal");
    shutdown.cancel();

    engine_task.await.context("engine task panicked")?;
    web_task.await.context("web task panicked")?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
