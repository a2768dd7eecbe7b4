//! High-level operations.
//!
//! This module contains the implementation of Kiln commands.

pub mod kiln_build;
pub mod kiln_clean;

pub use kiln_build::{build, Artifact, BuildOptions};
pub use kiln_clean::{clean, CleanOptions};
pub use kiln_test::{test, testable_packages, TestOptions};
