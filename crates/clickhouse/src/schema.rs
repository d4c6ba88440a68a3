//! ClickHouse table schemas.
//!
//! Layout:
//! - `funnel.events` is the append-only raw table owned by the ingestion
//!   collaborator; the engine only reads it.
//! - `funnel.watermarks` holds one row per metric; ReplacingMergeTree
//!   versioned by last_event_time collapses rewrites to the maximum.
//! - Rollup tables are SummingMergeTree keyed by (page_url, event_date)
//!   so batch-inserted deltas fold additively into existing keys.

/// SQL for creating the funnel database.
pub const CREATE_DATABASE: &str = "CREATE DATABASE IF NOT EXISTS funnel";

/// SQL for creating the raw events table.
///
/// Partitioned by month and ordered by page for delta-scan efficiency.
pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.events (
    event_id String,
    event_name LowCardinality(String),
    event_time DateTime64(3),
    page_url String,
    session_id String,
    user_id Nullable(String),
    order_value Nullable(Float64),
    percent_scroll Nullable(Float64),
    created_at DateTime DEFAULT now()
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(event_time)
ORDER BY (page_url, event_time)
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the watermark table.
///
/// One row per metric; a missing row reads as the epoch-zero sentinel.
pub const CREATE_WATERMARKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.watermarks (
    metric_name String,
    last_event_time DateTime64(3)
)
ENGINE = ReplacingMergeTree(last_event_time)
ORDER BY metric_name
"#;

/// SQL for creating the add-to-cart rollup table.
pub const CREATE_ADD_TO_CART_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.add_to_cart_daily (
    page_url String,
    event_date Date,
    add_to_cart_events UInt64
)
ENGINE = SummingMergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (page_url, event_date)
"#;

/// SQL for creating the checkout rollup table.
pub const CREATE_CHECKOUT_COMPLETED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.checkout_completed_daily (
    page_url String,
    event_date Date,
    checkout_completed UInt64
)
ENGINE = SummingMergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (page_url, event_date)
"#;

/// SQL for creating the sessions rollup table.
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.sessions_daily (
    page_url String,
    event_date Date,
    number_of_sessions UInt64
)
ENGINE = SummingMergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (page_url, event_date)
"#;

/// SQL for creating the revenue rollup table.
pub const CREATE_REVENUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.revenue_daily (
    page_url String,
    event_date Date,
    total_revenue Float64
)
ENGINE = SummingMergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (page_url, event_date)
"#;

/// SQL for creating the scroll-depth rollup table.
///
/// Keeps the scroll sum and the event count side by side so readers can
/// derive a mean depth per (page, day).
pub const CREATE_SCROLL_DEPTH_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.scroll_depth_daily (
    page_url String,
    event_date Date,
    total_scroll_sum Float64,
    total_events UInt64
)
ENGINE = SummingMergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (page_url, event_date)
"#;

/// SQL for creating the internal metrics table (dogfooding).
pub const CREATE_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel.internal_metrics (
    timestamp DateTime64(3),
    pipeline_runs UInt64,
    pipeline_failures UInt64,
    pipeline_skips UInt64,
    empty_deltas UInt64,
    delta_rows_merged UInt64,
    watermark_advances UInt64,
    delta_latency_mean_ms Float64,
    merge_latency_mean_ms Float64,
    pipeline_latency_mean_ms Float64,
    inflight_pipelines UInt64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL toDateTime(timestamp) + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#;

/// All DDL statements, in creation order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_DATABASE,
        CREATE_EVENTS_TABLE,
        CREATE_WATERMARKS_TABLE,
        CREATE_ADD_TO_CART_TABLE,
        CREATE_CHECKOUT_COMPLETED_TABLE,
        CREATE_SESSIONS_TABLE,
        CREATE_REVENUE_TABLE,
        CREATE_SCROLL_DEPTH_TABLE,
        CREATE_METRICS_TABLE,
    ]
}
