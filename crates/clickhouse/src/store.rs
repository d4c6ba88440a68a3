//! ClickHouse implementation of the rollup store contract.
//!
//! The merge path relies on the rollup tables being SummingMergeTree:
//! one atomic batch insert of partial sums is ClickHouse's native upsert,
//! folding duplicate (page_url, event_date) keys additively at merge
//! time. Readers aggregate with sum()/FINAL per the table contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;

use engine_core::{DeltaRow, Error, MetricDef, Result, RollupStore};

use crate::client::ClickHouseClient;
use crate::sql;
use crate::wire::{date_to_days, datetime_to_millis, days_to_date, millis_to_datetime};

/// Rollup store backed by a ClickHouse warehouse.
#[derive(Clone)]
pub struct WarehouseStore {
    client: Arc<ClickHouseClient>,
}

impl WarehouseStore {
    pub fn new(client: Arc<ClickHouseClient>) -> Self {
        Self { client }
    }

    /// Returns the underlying client (metrics flush, health checks).
    pub fn client(&self) -> &Arc<ClickHouseClient> {
        &self.client
    }

    async fn write_rows<R>(&self, table: &str, rows: &[R]) -> Result<()>
    where
        R: Row + Serialize,
    {
        let mut insert = self
            .client
            .inner()
            .insert(table)
            .map_err(|e| Error::store(format!("insert error: {e}")))?;

        for row in rows {
            insert
                .write(row)
                .await
                .map_err(|e| Error::store(format!("write error: {e}")))?;
        }

        insert
            .end()
            .await
            .map_err(|e| Error::store(format!("end error: {e}")))?;

        Ok(())
    }
}

/// Delta group as returned by the grouped scan.
#[derive(Debug, Clone, Row, Deserialize)]
struct DeltaRowWire {
    page_url: String,
    event_date: u16,
    value: f64,
    events: u64,
    max_event_time: i64,
}

impl From<DeltaRowWire> for DeltaRow {
    fn from(wire: DeltaRowWire) -> Self {
        Self {
            page_url: wire.page_url,
            event_date: days_to_date(wire.event_date),
            value: wire.value,
            events: wire.events,
            max_event_time: millis_to_datetime(wire.max_event_time),
        }
    }
}

/// Watermark row; ReplacingMergeTree collapses rewrites to the maximum
/// last_event_time, so plain inserts cannot move the watermark backward.
#[derive(Debug, Clone, Row, Serialize)]
struct WatermarkRow {
    metric_name: String,
    last_event_time: i64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct AddToCartRollupRow {
    page_url: String,
    event_date: u16,
    add_to_cart_events: u64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct CheckoutRollupRow {
    page_url: String,
    event_date: u16,
    checkout_completed: u64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct SessionsRollupRow {
    page_url: String,
    event_date: u16,
    number_of_sessions: u64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct RevenueRollupRow {
    page_url: String,
    event_date: u16,
    total_revenue: f64,
}

#[derive(Debug, Clone, Row, Serialize)]
struct ScrollRollupRow {
    page_url: String,
    event_date: u16,
    total_scroll_sum: f64,
    total_events: u64,
}

fn add_to_cart_rows(delta: &[DeltaRow]) -> Vec<AddToCartRollupRow> {
    delta
        .iter()
        .map(|d| AddToCartRollupRow {
            page_url: d.page_url.clone(),
            event_date: date_to_days(d.event_date),
            add_to_cart_events: d.value as u64,
        })
        .collect()
}

fn checkout_rows(delta: &[DeltaRow]) -> Vec<CheckoutRollupRow> {
    delta
        .iter()
        .map(|d| CheckoutRollupRow {
            page_url: d.page_url.clone(),
            event_date: date_to_days(d.event_date),
            checkout_completed: d.value as u64,
        })
        .collect()
}

fn sessions_rows(delta: &[DeltaRow]) -> Vec<SessionsRollupRow> {
    delta
        .iter()
        .map(|d| SessionsRollupRow {
            page_url: d.page_url.clone(),
            event_date: date_to_days(d.event_date),
            number_of_sessions: d.value as u64,
        })
        .collect()
}

fn revenue_rows(delta: &[DeltaRow]) -> Vec<RevenueRollupRow> {
    delta
        .iter()
        .map(|d| RevenueRollupRow {
            page_url: d.page_url.clone(),
            event_date: date_to_days(d.event_date),
            total_revenue: d.value,
        })
        .collect()
}

fn scroll_rows(delta: &[DeltaRow]) -> Vec<ScrollRollupRow> {
    delta
        .iter()
        .map(|d| ScrollRollupRow {
            page_url: d.page_url.clone(),
            event_date: date_to_days(d.event_date),
            total_scroll_sum: d.value,
            total_events: d.events,
        })
        .collect()
}

#[async_trait]
impl RollupStore for WarehouseStore {
    async fn load_watermark(&self, metric: &str) -> Result<DateTime<Utc>> {
        let millis: i64 = self
            .client
            .inner()
            .query(&sql::watermark_query())
            .bind(metric)
            .fetch_one()
            .await
            .map_err(|e| Error::store(format!("watermark query error: {e}")))?;

        Ok(millis_to_datetime(millis))
    }

    async fn fetch_delta(
        &self,
        metric: &MetricDef,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<DeltaRow>> {
        let statement = sql::delta_query(metric);

        let mut query = self
            .client
            .inner()
            .query(&statement)
            .bind(datetime_to_millis(watermark));
        for name in metric.event_filter {
            query = query.bind(name.as_str());
        }

        let rows: Vec<DeltaRowWire> = query
            .fetch_all()
            .await
            .map_err(|e| Error::store(format!("delta query error: {e}")))?;

        debug!(
            metric = metric.name,
            groups = rows.len(),
            "Computed delta"
        );

        Ok(rows.into_iter().map(DeltaRow::from).collect())
    }

    async fn merge_delta(&self, metric: &MetricDef, delta: &[DeltaRow]) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }

        let start = std::time::Instant::now();
        let table = metric.rollup_table;

        // Measure columns are metric-specific, so each metric maps onto
        // its own typed row before the batch insert.
        match metric.name {
            "add_to_cart" => self.write_rows(table, &add_to_cart_rows(delta)).await?,
            "checkout_completed" => self.write_rows(table, &checkout_rows(delta)).await?,
            "sessions" => self.write_rows(table, &sessions_rows(delta)).await?,
            "total_revenue" => self.write_rows(table, &revenue_rows(delta)).await?,
            "scroll_depth" => self.write_rows(table, &scroll_rows(delta)).await?,
            other => return Err(Error::unknown_metric(other)),
        }

        let elapsed = start.elapsed();
        metrics().merge_latency_ms.observe(elapsed.as_millis() as u64);
        metrics().delta_rows_merged.inc_by(delta.len() as u64);

        debug!(
            metric = metric.name,
            table = table,
            rows = delta.len(),
            latency_ms = %elapsed.as_millis(),
            "Merged delta into rollup table"
        );

        Ok(())
    }

    async fn advance_watermark(&self, metric: &str, candidate: DateTime<Utc>) -> Result<()> {
        let row = WatermarkRow {
            metric_name: metric.to_string(),
            last_event_time: datetime_to_millis(candidate),
        };

        self.write_rows(sql::WATERMARKS_TABLE, &[row]).await?;
        metrics().watermark_advances.inc();

        debug!(metric = metric, watermark = %candidate, "Advanced watermark");
        Ok(())
    }
}
