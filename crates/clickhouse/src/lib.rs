//! ClickHouse-backed rollup store for the aggregation engine.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod schema;
pub mod sql;
pub mod store;
pub mod wire;

pub use client::*;
pub use config::*;
pub use store::WarehouseStore;
