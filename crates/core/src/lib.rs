//! Core types, metric definitions, and the store contract for the
//! funnel rollup engine.

pub mod error;
pub mod events;
pub mod metric;
pub mod rollup;
pub mod store;

pub use error::{Error, Result};
pub use events::*;
pub use metric::*;
pub use rollup::*;
pub use store::RollupStore;
