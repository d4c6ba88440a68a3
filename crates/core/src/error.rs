//! Unified error types for the rollup engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the rollup engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Warehouse query or insert failure. Transient by assumption;
    /// the pipeline that hit it is retried on the next tick.
    #[error("store error: {0}")]
    Store(String),

    /// A pipeline stage exceeded its query timeout.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Startup configuration problem. Fatal; surfaced before
    /// scheduling begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown metric name in a watermark or pipeline request.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unknown_metric(name: impl Into<String>) -> Self {
        Self::UnknownMetric(name.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the next scheduled tick should retry after this error.
    ///
    /// Everything except configuration problems is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::UnknownMetric(_))
    }
}
