//! Internal-metrics flush into ClickHouse.

use crate::client::ClickHouseClient;
use clickhouse::Row;
use engine_core::{Error, Result};
use serde::Serialize;
use telemetry::MetricsSnapshot;
use tracing::debug;

/// Internal metrics row for ClickHouse.
#[derive(Debug, Clone, Row, Serialize)]
pub struct MetricsRow {
    pub timestamp: i64,
    pub pipeline_runs: u64,
    pub pipeline_failures: u64,
    pub pipeline_skips: u64,
    pub empty_deltas: u64,
    pub delta_rows_merged: u64,
    pub watermark_advances: u64,
    pub delta_latency_mean_ms: f64,
    pub merge_latency_mean_ms: f64,
    pub pipeline_latency_mean_ms: f64,
    pub inflight_pipelines: u64,
}

impl From<MetricsSnapshot> for MetricsRow {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp.timestamp_millis(),
            pipeline_runs: snapshot.pipeline_runs,
            pipeline_failures: snapshot.pipeline_failures,
            pipeline_skips: snapshot.pipeline_skips,
            empty_deltas: snapshot.empty_deltas,
            delta_rows_merged: snapshot.delta_rows_merged,
            watermark_advances: snapshot.watermark_advances,
            delta_latency_mean_ms: snapshot.delta_latency_mean_ms,
            merge_latency_mean_ms: snapshot.merge_latency_mean_ms,
            pipeline_latency_mean_ms: snapshot.pipeline_latency_mean_ms,
            inflight_pipelines: snapshot.inflight_pipelines,
        }
    }
}

/// Insert a metrics snapshot into funnel.internal_metrics.
pub async fn insert_metrics(client: &ClickHouseClient, snapshot: MetricsSnapshot) -> Result<()> {
    let row = MetricsRow::from(snapshot);

    let mut insert = client
        .inner()
        .insert("funnel.internal_metrics")
        .map_err(|e| Error::store(format!("insert error: {e}")))?;

    insert
        .write(&row)
        .await
        .map_err(|e| Error::store(format!("write error: {e}")))?;

    insert
        .end()
        .await
        .map_err(|e| Error::store(format!("end error: {e}")))?;

    debug!("Flushed internal metrics");
    Ok(())
}
