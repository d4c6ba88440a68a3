//! Shared fixtures and mocks for the aggregation test suites.

pub mod mocks;
