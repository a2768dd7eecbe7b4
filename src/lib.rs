//! Kiln - a build orchestrator for embedded firmware projects.
//!
//! This crate provides the core library functionality for Kiln,
//! including dependency, feature and API resolution, compiler flag
//! aggregation, and build execution.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Kiln unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides on-disk project fixtures and a recording
/// toolchain.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildError, Builder};
pub use core::{Manifest, Package, PackageId, Project, Target};
pub use util::context::GlobalContext;
