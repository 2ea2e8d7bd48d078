//! # Structured Logging
//!
//! Environment-aware tracing initialization. Output goes to the console;
//! the filter is taken from `RUST_LOG` when set, otherwise derived from the
//! runtime environment.

use std::sync::OnceLock;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level(&environment)));

        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_filter(filter));

        // A subscriber may already be installed by test harnesses.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(environment = %environment, "logging initialized");
    });
}

/// Current runtime environment, defaulting to `development`.
fn environment() -> String {
    std::env::var("DEPLOYER_ENV").unwrap_or_else(|_| "development".to_string())
}

fn default_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
