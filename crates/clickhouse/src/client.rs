//! Warehouse client handle.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use engine_core::Result;
use tracing::info;

/// Shared handle to the ClickHouse warehouse.
///
/// Carries the engine's database, credentials, and a server-side
/// execution cap so a runaway delta scan is killed by the warehouse as
/// well as by the pipeline's own stage timeout.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
}

impl ClickHouseClient {
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            timeout_secs = config.timeout_secs,
            "Created ClickHouse client"
        );

        Ok(Self { inner: client })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}
