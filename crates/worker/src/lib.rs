//! Aggregation pipelines and scheduling for the rollup engine.
//!
//! One pipeline per registered metric per tick:
//! compute delta → merge into rollup table → advance watermark.
//! Pipelines for different metrics run concurrently; runs for the same
//! metric are serialized (skip-if-running).

pub mod pipeline;
pub mod scheduler;

pub use pipeline::*;
pub use scheduler::*;
