//! Core data structures for Kiln.
//!
//! This module contains the package model the builder operates on:
//! - Package identifiers and manifests
//! - Project discovery
//! - Targets and board support packages

pub mod bsp;
pub mod manifest;
pub mod package;
pub mod package_id;
pub mod project;
pub mod target;

pub use bsp::BspPackage;
pub use manifest::{Manifest, PackageKind, PackageSettings, MANIFEST_NAME};
pub use package::Package;
pub use package_id::PackageId;
pub use project::{find_project_root, Project, PROJECT_MANIFEST_NAME};
pub use target::Target;
