//! Shared test utilities for slipscan integration tests.
//!
//! This module provides:
//! - `TestHarness`: an isolated coordinator over temp directories and an
//!   in-memory database
//! - Fake rasterizer/extractor implementations with failure switches
//! - Builders for test PDFs and configs

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
