//! Funnel Rollup Engine
//!
//! Background aggregation service:
//! - Scans raw analytics events newer than each metric's watermark
//! - Merges per-page, per-day deltas into durable rollup tables
//! - Advances watermarks only after merges commit
//! - Runs all registered metrics concurrently on a fixed interval

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, WarehouseStore};
use engine_core::registered_metrics;
use telemetry::init_tracing_from_env;
use worker::{AggregationScheduler, AggregatorConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    aggregator: AggregatorConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Funnel Rollup Engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;

    // Initialize ClickHouse client
    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );

    // Schema problems are configuration errors: bail before any tick.
    clickhouse_client::health::init_schema(&clickhouse)
        .await
        .context("Failed to initialize ClickHouse schema")?;

    if clickhouse_client::health::check_connection(&clickhouse).await {
        info!("ClickHouse connection: healthy");
    } else {
        anyhow::bail!("ClickHouse connection check failed at startup");
    }

    // Register the production metrics and start the scheduler
    let store = Arc::new(WarehouseStore::new(clickhouse.clone()));
    let metrics = registered_metrics();
    info!(
        metrics = ?metrics.iter().map(|m| m.name).collect::<Vec<_>>(),
        interval_minutes = config.aggregator.interval_minutes,
        "Registering aggregation pipelines"
    );

    let scheduler = Arc::new(AggregationScheduler::with_metrics_flush(
        config.aggregator.clone(),
        store,
        metrics,
        clickhouse.clone(),
    ));
    let handles = scheduler.start();

    // Run until a shutdown signal arrives
    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ROLLUP")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested ClickHouse config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("ROLLUP_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("ROLLUP_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("ROLLUP_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("ROLLUP_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    // Manual overrides for nested aggregator config
    if let Ok(minutes) = std::env::var("ROLLUP_AGGREGATOR_INTERVAL_MINUTES") {
        config.aggregator.interval_minutes = minutes
            .parse()
            .context("ROLLUP_AGGREGATOR_INTERVAL_MINUTES must be an integer")?;
    }
    if let Ok(timeout) = std::env::var("ROLLUP_AGGREGATOR_QUERY_TIMEOUT_SECS") {
        config.aggregator.query_timeout_secs = timeout
            .parse()
            .context("ROLLUP_AGGREGATOR_QUERY_TIMEOUT_SECS must be an integer")?;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
