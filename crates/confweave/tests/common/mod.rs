//! Shared test utilities for confweave integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Builders for source specs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
