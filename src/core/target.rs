//! Build targets.
//!
//! A target is a package of type `target` that binds an application to a
//! board support package and selects a build profile. It also contributes
//! its own flags and feature filters like any other package.

use anyhow::{bail, Result};

use crate::core::manifest::{PackageKind, TargetSettings};
use crate::core::{Package, PackageId, Project};

/// Directory conventionally holding target packages.
pub const TARGETS_DIR: &str = "targets";

/// A resolved build target.
#[derive(Debug, Clone)]
pub struct Target {
    package: Package,
    settings: TargetSettings,
}

impl Target {
    /// Find a target in the project by full name or by its name under
    /// `targets/`.
    pub fn find(project: &Project, name: &str) -> Result<Self> {
        let package = project
            .package(name)
            .or_else(|| project.package(&format!("{}/{}", TARGETS_DIR, name)));

        let Some(package) = package else {
            bail!("target `{}` not found in project `{}`", name, project.name());
        };

        Self::from_package(package.clone())
    }

    /// Wrap a package of type `target`.
    pub fn from_package(package: Package) -> Result<Self> {
        if package.kind() != PackageKind::Target {
            bail!(
                "package `{}` is not a target (type is \"{}\")",
                package.full_name(),
                package.kind()
            );
        }

        let settings = package.manifest().target.clone().unwrap_or_default();
        Ok(Target { package, settings })
    }

    /// The target's own package.
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn package_id(&self) -> &PackageId {
        self.package.package_id()
    }

    pub fn full_name(&self) -> &str {
        self.package.full_name()
    }

    /// Short name, used for the output directory.
    pub fn name(&self) -> &str {
        self.package.package_id().basename()
    }

    /// Name of the application package, if any.
    pub fn app_name(&self) -> Option<&str> {
        self.settings.app.as_deref().filter(|s| !s.is_empty())
    }

    /// Name of the board support package, if any.
    pub fn bsp_name(&self) -> Option<&str> {
        self.settings.bsp.as_deref().filter(|s| !s.is_empty())
    }

    pub fn build_profile(&self) -> &str {
        &self.settings.build_profile
    }

    /// Resolve the application package.
    pub fn app<'a>(&self, project: &'a Project) -> Option<&'a Package> {
        self.app_name().and_then(|name| project.package(name))
    }

    /// Resolve the board support package.
    pub fn bsp<'a>(&self, project: &'a Project) -> Option<&'a Package> {
        self.bsp_name().and_then(|name| project.package(name))
    }

    /// Check that the target names the packages a build needs.
    ///
    /// Test builds supply their own entry point and so do not need an app.
    pub fn validate(&self, project: &Project, app_required: bool) -> Result<()> {
        match self.bsp_name() {
            None => bail!("BSP package not specified by target `{}`", self.full_name()),
            Some(name) => match project.package(name) {
                None => bail!("BSP package not found: {}", name),
                Some(pkg) if pkg.kind() != PackageKind::Bsp => bail!(
                    "package `{}` used as BSP by target `{}` has type \"{}\"",
                    name,
                    self.full_name(),
                    pkg.kind()
                ),
                Some(_) => {}
            },
        }

        if app_required {
            match self.app_name() {
                None => bail!("target `{}` does not specify an app package", self.full_name()),
                Some(name) => match project.package(name) {
                    None => bail!("App package not found: {}", name),
                    Some(pkg) if pkg.kind() != PackageKind::App => bail!(
                        "package `{}` used as app by target `{}` has type \"{}\"",
                        name,
                        self.full_name(),
                        pkg.kind()
                    ),
                    Some(_) => {}
                },
            }
        }

        Ok(())
    }
}
