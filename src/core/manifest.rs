//! `pkg.toml` manifest parsing and schema.
//!
//! Every package directory carries one `pkg.toml`. The `[package]` and
//! `[build]` sections are common to all packages; targets, BSPs and
//! compiler packages add their own typed section.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::fs::read_to_string;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "pkg.toml";

/// The parsed `pkg.toml` manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Package metadata
    pub package: PackageMetadata,

    /// Settings applied regardless of the feature set
    #[serde(default)]
    pub build: PackageSettings,

    /// Settings applied when the named feature is visible to this package
    #[serde(default)]
    pub when: BTreeMap<String, PackageSettings>,

    /// Feature blacklist contributed by this package
    #[serde(default)]
    pub feature_blacklist: Vec<FeatureFilterSpec>,

    /// Feature whitelist contributed by this package
    #[serde(default)]
    pub feature_whitelist: Vec<FeatureFilterSpec>,

    /// Target settings (only for `type = "target"`)
    #[serde(default)]
    pub target: Option<TargetSettings>,

    /// Board settings (only for `type = "bsp"`)
    #[serde(default)]
    pub bsp: Option<BspSettings>,

    /// Toolchain settings (only for `type = "compiler"`)
    #[serde(default)]
    pub compiler: Option<CompilerSettings>,
}

/// Package metadata from the `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Full qualified package name
    pub name: String,

    /// Package type
    #[serde(rename = "type", default)]
    pub kind: PackageKind,

    /// Optional package version
    #[serde(default)]
    pub version: Option<Version>,

    #[serde(default)]
    pub description: Option<String>,

    /// Explicit source roots, relative to the package directory
    #[serde(default)]
    pub src_dirs: Vec<PathBuf>,
}

/// The role a package plays in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    App,
    Bsp,
    #[default]
    Lib,
    Target,
    Compiler,
    Sdk,
    Unittest,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::App => "app",
            PackageKind::Bsp => "bsp",
            PackageKind::Lib => "lib",
            PackageKind::Target => "target",
            PackageKind::Compiler => "compiler",
            PackageKind::Sdk => "sdk",
            PackageKind::Unittest => "unittest",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency, API, feature and flag settings.
///
/// Used both for the unconditional `[build]` section and for each
/// feature-gated `[when.<FEATURE>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Packages this package depends on
    pub deps: Vec<String>,

    /// APIs this package provides
    pub apis: Vec<String>,

    /// APIs this package requires some other package to provide
    pub req_apis: Vec<String>,

    /// Features this package turns on for the build
    pub features: Vec<String>,

    pub cflags: Vec<String>,
    pub lflags: Vec<String>,
    pub aflags: Vec<String>,

    /// Public include directories, relative to the package directory
    pub include_dirs: Vec<PathBuf>,
}

impl PackageSettings {
    /// Append every list of `other` onto this one.
    pub fn extend(&mut self, other: &PackageSettings) {
        self.deps.extend(other.deps.iter().cloned());
        self.apis.extend(other.apis.iter().cloned());
        self.req_apis.extend(other.req_apis.iter().cloned());
        self.features.extend(other.features.iter().cloned());
        self.cflags.extend(other.cflags.iter().cloned());
        self.lflags.extend(other.lflags.iter().cloned());
        self.aflags.extend(other.aflags.iter().cloned());
        self.include_dirs.extend(other.include_dirs.iter().cloned());
    }
}

/// A raw `[[feature_blacklist]]` / `[[feature_whitelist]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFilterSpec {
    /// Regular expression matched against package full names
    pub package: String,

    /// Feature name the entry applies to
    pub feature: String,
}

/// `[target]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Application package
    #[serde(default)]
    pub app: Option<String>,

    /// Board support package
    #[serde(default)]
    pub bsp: Option<String>,

    /// Compiler profile to select flags from
    #[serde(default = "default_build_profile")]
    pub build_profile: String,
}

fn default_build_profile() -> String {
    "default".to_string()
}

impl Default for TargetSettings {
    fn default() -> Self {
        TargetSettings {
            app: None,
            bsp: None,
            build_profile: default_build_profile(),
        }
    }
}

/// `[bsp]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BspSettings {
    /// Target architecture (selects `arch/<arch>` source subtrees)
    #[serde(default)]
    pub arch: Option<String>,

    /// Compiler package used for this board
    #[serde(default)]
    pub compiler: Option<String>,

    /// Linker script, relative to the BSP package directory
    #[serde(default)]
    pub linker_script: Option<PathBuf>,

    /// Feature-gated overrides
    #[serde(default)]
    pub when: BTreeMap<String, BspOverrides>,
}

/// Feature-gated `[bsp.when.<FEATURE>]` overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BspOverrides {
    #[serde(default)]
    pub linker_script: Option<PathBuf>,
}

impl BspSettings {
    /// The linker script after applying every visible feature override.
    ///
    /// Overrides are applied in feature-name order; the last one wins.
    pub fn linker_script_for(&self, features: &BTreeSet<String>) -> Option<PathBuf> {
        let mut script = self.linker_script.clone();
        for (feature, overrides) in &self.when {
            if features.contains(feature) {
                if let Some(ref s) = overrides.linker_script {
                    script = Some(s.clone());
                }
            }
        }
        script
    }
}

/// `[compiler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// C compiler (also the link driver)
    #[serde(default = "default_cc")]
    pub cc: PathBuf,

    /// Assembler driver; defaults to `cc`
    #[serde(default, rename = "as")]
    pub asm: Option<PathBuf>,

    /// Archiver
    #[serde(default = "default_ar")]
    pub ar: PathBuf,

    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub aflags: Vec<String>,
    #[serde(default)]
    pub lflags: Vec<String>,

    /// Per-build-profile flags
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileFlags>,
}

fn default_cc() -> PathBuf {
    PathBuf::from("cc")
}

fn default_ar() -> PathBuf {
    PathBuf::from("ar")
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            cc: default_cc(),
            asm: None,
            ar: default_ar(),
            cflags: Vec::new(),
            aflags: Vec::new(),
            lflags: Vec::new(),
            profile: BTreeMap::new(),
        }
    }
}

/// Flags contributed by one build profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFlags {
    pub cflags: Vec<String>,
    pub aflags: Vec<String>,
    pub lflags: Vec<String>,
}

impl Manifest {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse a manifest from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(contents)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.package.name.trim_matches('/').is_empty() {
            anyhow::bail!("package name cannot be empty");
        }

        match self.package.kind {
            PackageKind::Target if self.target.is_none() => {
                anyhow::bail!(
                    "package `{}` has type \"target\" but no [target] section",
                    self.package.name
                );
            }
            PackageKind::Bsp if self.bsp.is_none() => {
                anyhow::bail!(
                    "package `{}` has type \"bsp\" but no [bsp] section",
                    self.package.name
                );
            }
            PackageKind::Compiler if self.compiler.is_none() => {
                anyhow::bail!(
                    "package `{}` has type \"compiler\" but no [compiler] section",
                    self.package.name
                );
            }
            _ => {}
        }

        Ok(())
    }

    /// The settings that apply for the given visible feature set.
    ///
    /// The `[build]` section comes first, followed by each `[when.*]`
    /// section in feature-name order.
    pub fn settings_for(&self, features: &BTreeSet<String>) -> PackageSettings {
        let mut settings = self.build.clone();
        for (feature, section) in &self.when {
            if features.contains(feature) {
                settings.extend(section);
            }
        }
        settings
    }
}
