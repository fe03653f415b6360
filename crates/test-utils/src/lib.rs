//! Shared test utilities for the meteosat-ingest workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary directory layouts for state, output and working areas
//! - Catalog fixtures (search responses, product archives)
//! - In-memory fakes for the catalog and the raster toolchain, with
//!   per-stage failure injection
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{FakeCatalog, FailurePlan, Stage, TestDirs};
//! ```

pub mod fakes;
pub mod fixtures;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fakes::*;
pub use fixtures::*;
pub use paths::*;
