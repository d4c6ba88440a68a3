//! Internal telemetry for the rollup engine.
//!
//! Instead of an external metrics system, counters are collected
//! in-process and periodically flushed to the warehouse the engine
//! already writes to.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
