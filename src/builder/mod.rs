//! Firmware build system.
//!
//! This module resolves the packages, features and APIs of a target,
//! aggregates compiler flags, and drives a toolchain through compile,
//! archive, link and test.

pub mod build;
pub mod build_manifest;
pub mod build_package;
pub mod compiler_info;
pub mod errors;
pub mod features;
pub mod resolver;
pub mod toolchain;

pub use build::{BuildState, Builder};
pub use build_manifest::BuildManifest;
pub use build_package::BuildPackage;
pub use compiler_info::{CompilerInfo, Define};
pub use errors::{BuildError, BuildResult, UnsatisfiedApi};
pub use features::{FeatureFilter, FeatureSet, FEATURE_SELFTEST, FEATURE_TEST};
pub use resolver::{ApiConflict, ApiRegistry, Resolver};
pub use toolchain::{GccProvider, GccToolchain, Toolchain, ToolchainProvider, UnitKind};
