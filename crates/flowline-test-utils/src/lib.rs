//! Shared test utilities for flowline crates.

pub mod fixtures;
pub mod mock_executor;

pub use mock_executor::{MockBatch, MockExecutor};
