//! Aggregation scheduler.
//!
//! A single interval ticker fans out one task per registered metric.
//! Per-metric mutexes give skip-if-running serialization; a semaphore
//! bounds how many pipelines hold warehouse queries at once. One
//! metric's failure never cancels siblings or the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use clickhouse_client::{insert::insert_metrics, ClickHouseClient};
use engine_core::{MetricDef, RollupStore};
use telemetry::metrics;

use crate::pipeline::MetricPipeline;

/// Scheduler configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AggregatorConfig {
    /// Minutes between aggregation ticks
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Max pipelines with in-flight warehouse queries
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_pipelines: usize,
    /// Per-stage query timeout in seconds
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Seconds between internal-metrics flushes
    #[serde(default = "default_metrics_flush_secs")]
    pub metrics_flush_secs: u64,
}

fn default_interval_minutes() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    4
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_metrics_flush_secs() -> u64 {
    60
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_concurrent_pipelines: default_max_concurrent(),
            query_timeout_secs: default_query_timeout_secs(),
            metrics_flush_secs: default_metrics_flush_secs(),
        }
    }
}

impl AggregatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_secs)
    }
}

/// Fans pipeline runs out across registered metrics on a fixed interval.
pub struct AggregationScheduler {
    config: AggregatorConfig,
    store: Arc<dyn RollupStore>,
    registered: Vec<MetricDef>,
    /// One lock per metric; holding it is "a run is in flight".
    locks: HashMap<&'static str, Arc<Mutex<()>>>,
    semaphore: Arc<Semaphore>,
    clickhouse: Option<Arc<ClickHouseClient>>,
}

impl AggregationScheduler {
    pub fn new(
        config: AggregatorConfig,
        store: Arc<dyn RollupStore>,
        registered: Vec<MetricDef>,
    ) -> Self {
        let locks = registered
            .iter()
            .map(|m| (m.name, Arc::new(Mutex::new(()))))
            .collect();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_pipelines));

        Self {
            config,
            store,
            registered,
            locks,
            semaphore,
            clickhouse: None,
        }
    }

    /// Creates a scheduler that also flushes internal metrics to the
    /// warehouse.
    pub fn with_metrics_flush(
        config: AggregatorConfig,
        store: Arc<dyn RollupStore>,
        registered: Vec<MetricDef>,
        clickhouse: Arc<ClickHouseClient>,
    ) -> Self {
        let mut scheduler = Self::new(config, store, registered);
        scheduler.clickhouse = Some(clickhouse);
        scheduler
    }

    /// Starts the background loops.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_aggregation_loop().await;
        }));

        if self.clickhouse.is_some() {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_metrics_flush().await;
            }));
        }

        info!(
            metrics = self.registered.len(),
            interval_minutes = self.config.interval_minutes,
            "Aggregation scheduler started"
        );
        handles
    }

    async fn run_aggregation_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.tick_interval());

        loop {
            ticker.tick().await;
            // Detached: a slow pipeline must not delay the next tick,
            // and the per-metric locks prevent overlap where it matters.
            let _handles = self.run_tick();
        }
    }

    /// Spawn one pipeline task per registered metric.
    ///
    /// Returns the task handles so tests can await quiescence; the
    /// production loop drops them.
    pub fn run_tick(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for metric in &self.registered {
            let Some(lock) = self.locks.get(metric.name).cloned() else {
                continue;
            };

            // Previous run for this metric still in flight: skip this
            // tick rather than racing it on the watermark.
            let Ok(guard) = lock.try_lock_owned() else {
                metrics().pipeline_skips.inc();
                warn!(metric = metric.name, "Previous run still in flight, skipping tick");
                continue;
            };

            let scheduler = self.clone();
            let metric = metric.clone();
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                scheduler.run_pipeline(metric).await;
            }));
        }

        handles
    }

    async fn run_pipeline(&self, metric: MetricDef) {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return;
        };

        metrics().pipeline_runs.inc();
        metrics().inflight_pipelines.inc();

        let pipeline = MetricPipeline::new(
            self.store.clone(),
            metric.clone(),
            self.config.query_timeout(),
        );

        match pipeline.run().await {
            Ok(outcome) => {
                if outcome.delta_groups > 0 {
                    info!(
                        metric = outcome.metric,
                        groups = outcome.delta_groups,
                        watermark = ?outcome.advanced_to,
                        "Aggregation pipeline complete"
                    );
                }
            }
            Err(e) => {
                metrics().pipeline_failures.inc();
                error!(
                    metric = metric.name,
                    stage = e.stage.as_str(),
                    error = %e.source,
                    "Aggregation pipeline failed, watermark unchanged"
                );
            }
        }

        metrics().inflight_pipelines.dec();
    }

    async fn run_metrics_flush(self: Arc<Self>) {
        let Some(ref clickhouse) = self.clickhouse else {
            return;
        };

        let mut ticker = interval(self.config.metrics_flush_interval());

        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            if let Err(e) = insert_metrics(clickhouse, snapshot).await {
                metrics().metrics_flush_errors.inc();
                error!("Failed to flush metrics: {}", e);
            }
        }
    }
}
