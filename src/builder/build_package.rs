//! Per-package resolution state.
//!
//! A BuildPackage tracks what the resolver has learned about one package:
//! its resolved dependencies, the APIs it provides and requires, and
//! whether that information is current. Currency is recorded as the
//! resolver generation in which it was computed, so invalidating every
//! package after a feature discovery is a single counter bump.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::builder::compiler_info::{CompilerInfo, Define};
use crate::builder::errors::{BuildError, BuildResult};
use crate::builder::features::{FeatureFilter, FeatureSet};
use crate::builder::resolver::ApiRegistry;
use crate::core::{Package, PackageId, PackageSettings, Project};

/// Shared build state a package resolves against.
pub struct ResolveContext<'a> {
    pub project: &'a Project,
    pub features: &'a mut FeatureSet,
    pub apis: &'a mut ApiRegistry,
    pub filter: &'a FeatureFilter,
    /// Packages already in the build
    pub known: &'a BTreeMap<PackageId, BuildPackage>,
    pub generation: u64,
}

/// What one resolve call discovered.
#[derive(Debug, Default)]
pub struct Resolution {
    /// New packages were added to the build or a new API was registered
    pub new_deps: bool,
    /// A feature not previously in the feature set became supported
    pub new_features: bool,
    /// Dependencies not yet present in the build
    pub discovered: Vec<PackageId>,
}

/// Resolution state for one package.
#[derive(Debug, Clone)]
pub struct BuildPackage {
    id: PackageId,

    /// Generation in which dependencies were last fully resolved
    deps_generation: Option<u64>,

    /// Generation in which every required API was last satisfied
    apis_generation: Option<u64>,

    /// Resolved direct dependencies
    deps: BTreeSet<PackageId>,

    /// APIs this package provides
    apis: BTreeSet<String>,

    /// Required APIs and whether each has a provider
    req_apis: BTreeMap<String, bool>,

    /// Settings injected by the builder rather than the manifest
    injected: CompilerInfo,
}

impl BuildPackage {
    pub fn new(id: PackageId) -> Self {
        BuildPackage {
            id,
            deps_generation: None,
            apis_generation: None,
            deps: BTreeSet::new(),
            apis: BTreeSet::new(),
            req_apis: BTreeMap::new(),
            injected: CompilerInfo::new(),
        }
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.full_name()
    }

    pub fn deps(&self) -> &BTreeSet<PackageId> {
        &self.deps
    }

    pub fn apis(&self) -> &BTreeSet<String> {
        &self.apis
    }

    /// Required API names.
    pub fn req_apis(&self) -> impl Iterator<Item = &str> {
        self.req_apis.keys().map(String::as_str)
    }

    pub fn deps_resolved(&self, generation: u64) -> bool {
        self.deps_generation == Some(generation)
    }

    pub fn apis_satisfied(&self, generation: u64) -> bool {
        self.apis_generation == Some(generation)
    }

    /// Add settings on top of whatever the manifest produces.
    pub fn inject(&mut self, info: &CompilerInfo) {
        self.injected.merge(info);
    }

    /// Resolve this package against the current build state.
    pub fn resolve(&mut self, ctx: &mut ResolveContext<'_>) -> BuildResult<Resolution> {
        let package = lookup(ctx.project, &self.id)?;
        let visible = ctx.filter.visible_features(self.name(), ctx.features);
        let settings = package.manifest().settings_for(&visible);

        let mut resolution = Resolution::default();

        if !self.deps_resolved(ctx.generation) {
            resolution.new_features = self.load_features(&settings, ctx);
            self.load_deps(&settings, ctx, &mut resolution)?;

            if !resolution.new_features && !resolution.new_deps {
                self.deps_generation = Some(ctx.generation);
            }
        }

        if !self.apis_satisfied(ctx.generation) && self.satisfy_apis(ctx.apis) {
            self.apis_generation = Some(ctx.generation);
        }

        Ok(resolution)
    }

    /// Add every feature this package turns on that it is allowed to see.
    fn load_features(&self, settings: &PackageSettings, ctx: &mut ResolveContext<'_>) -> bool {
        let mut new_features = false;
        for feature in &settings.features {
            if !ctx.filter.is_feature_valid(self.name(), feature) {
                continue;
            }
            if ctx.features.add(feature.as_str()) {
                tracing::debug!("Package {} enabled feature {}", self.id, feature);
                new_features = true;
            }
        }
        new_features
    }

    fn load_deps(
        &mut self,
        settings: &PackageSettings,
        ctx: &mut ResolveContext<'_>,
        resolution: &mut Resolution,
    ) -> BuildResult<()> {
        for dep in &settings.deps {
            let Some(dep_pkg) = ctx.project.package(dep) else {
                return Err(BuildError::config(format!(
                    "could not resolve package dependency `{}` (required by `{}`)",
                    dep, self.id
                )));
            };
            let dep_id = dep_pkg.package_id().clone();
            if dep_id == self.id {
                continue;
            }

            if !ctx.known.contains_key(&dep_id) && !resolution.discovered.contains(&dep_id) {
                tracing::debug!("Package {} pulled in {}", self.id, dep_id);
                resolution.discovered.push(dep_id.clone());
                resolution.new_deps = true;
            }
            self.deps.insert(dep_id);
        }

        // A newly registered API may satisfy requirements of packages that
        // were already visited this pass, so it counts as new information.
        for api in &settings.apis {
            self.apis.insert(api.clone());
            if ctx.apis.add(api, &self.id) {
                resolution.new_deps = true;
            }
        }

        for api in &settings.req_apis {
            self.req_apis.entry(api.clone()).or_insert(false);
        }

        Ok(())
    }

    /// Look up a provider for each unsatisfied required API.
    ///
    /// A provider becomes a dependency of this package. Returns true when
    /// every requirement is satisfied.
    fn satisfy_apis(&mut self, apis: &ApiRegistry) -> bool {
        let mut all_satisfied = true;
        for (api, satisfied) in self.req_apis.iter_mut() {
            if *satisfied {
                continue;
            }
            match apis.provider(api) {
                Some(provider) => {
                    *satisfied = true;
                    if *provider != self.id {
                        self.deps.insert(provider.clone());
                    }
                }
                None => all_satisfied = false,
            }
        }
        all_satisfied
    }

    /// Compiler settings contributed by this package.
    ///
    /// `dep_closure` is the set of packages whose public include
    /// directories this package compiles against.
    pub fn compiler_info(
        &self,
        project: &Project,
        filter: &FeatureFilter,
        features: &FeatureSet,
        dep_closure: &BTreeSet<PackageId>,
    ) -> BuildResult<CompilerInfo> {
        let package = lookup(project, &self.id)?;
        let visible = filter.visible_features(self.name(), features);
        let settings = package.manifest().settings_for(&visible);

        let mut ci = CompilerInfo::new();
        ci.cflags = settings.cflags.clone();
        ci.lflags = settings.lflags.clone();
        ci.aflags = settings.aflags.clone();

        for feature in &visible {
            ci.add_define(Define::flag(format!("FEATURE_{}", feature)));
        }

        ci.include_dirs = public_include_dirs(package, &settings);
        let src_dir = package.root().join("src");
        if src_dir.is_dir() {
            ci.include_dirs.push(src_dir);
        }

        for dep_id in dep_closure {
            if *dep_id == self.id {
                continue;
            }
            let dep = lookup(project, dep_id)?;
            let dep_visible = filter.visible_features(dep_id.full_name(), features);
            let dep_settings = dep.manifest().settings_for(&dep_visible);
            ci.include_dirs
                .extend(public_include_dirs(dep, &dep_settings));
        }

        ci.merge(&self.injected);
        Ok(ci)
    }
}

/// Declared include directories, or `include` when none are declared.
fn public_include_dirs(package: &Package, settings: &PackageSettings) -> Vec<PathBuf> {
    if !settings.include_dirs.is_empty() {
        return settings
            .include_dirs
            .iter()
            .map(|dir| package.root().join(dir))
            .collect();
    }

    let default = package.root().join("include");
    if default.is_dir() {
        vec![default]
    } else {
        Vec::new()
    }
}

fn lookup<'a>(project: &'a Project, id: &PackageId) -> BuildResult<&'a Package> {
    project
        .package_by_id(id)
        .ok_or_else(|| BuildError::config(format!("package not found: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ProjectFixture;

    fn ctx_parts() -> (FeatureSet, ApiRegistry, FeatureFilter, BTreeMap<PackageId, BuildPackage>) {
        (
            FeatureSet::new(),
            ApiRegistry::new(),
            FeatureFilter::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_resolve_reports_new_deps_then_settles() {
        let fx = ProjectFixture::new()
            .lib("libs/os", "[build]\ndeps = [\"libs/util\"]\n")
            .lib("libs/util", "");
        let project = fx.load();
        let (mut features, mut apis, filter, mut known) = ctx_parts();

        let mut bpkg = BuildPackage::new(PackageId::new("libs/os"));
        let first = {
            let mut ctx = ResolveContext {
                project: &project,
                features: &mut features,
                apis: &mut apis,
                filter: &filter,
                known: &known,
                generation: 0,
            };
            bpkg.resolve(&mut ctx).unwrap()
        };
        assert!(first.new_deps);
        assert_eq!(first.discovered, [PackageId::new("libs/util")]);
        assert!(!bpkg.deps_resolved(0));

        known.insert(
            PackageId::new("libs/util"),
            BuildPackage::new(PackageId::new("libs/util")),
        );
        let second = {
            let mut ctx = ResolveContext {
                project: &project,
                features: &mut features,
                apis: &mut apis,
                filter: &filter,
                known: &known,
                generation: 0,
            };
            bpkg.resolve(&mut ctx).unwrap()
        };
        assert!(!second.new_deps);
        assert!(second.discovered.is_empty());
        assert!(bpkg.deps_resolved(0));
        assert!(!bpkg.deps_resolved(1));
    }

    #[test]
    fn test_resolve_unknown_dependency_fails() {
        let fx = ProjectFixture::new().lib("libs/os", "[build]\ndeps = [\"libs/missing\"]\n");
        let project = fx.load();
        let (mut features, mut apis, filter, known) = ctx_parts();

        let mut bpkg = BuildPackage::new(PackageId::new("libs/os"));
        let mut ctx = ResolveContext {
            project: &project,
            features: &mut features,
            apis: &mut apis,
            filter: &filter,
            known: &known,
            generation: 0,
        };
        let err = bpkg.resolve(&mut ctx).unwrap_err();
        assert!(matches!(err, BuildError::Configuration { .. }));
        assert!(err.to_string().contains("libs/missing"));
    }

    #[test]
    fn test_resolve_enables_features() {
        let fx = ProjectFixture::new().lib(
            "libs/shell",
            "[build]\nfeatures = [\"SHELL\"]\n\n[when.SHELL]\ndeps = [\"libs/console\"]\n",
        )
        .lib("libs/console", "");
        let project = fx.load();
        let (mut features, mut apis, filter, known) = ctx_parts();

        let mut bpkg = BuildPackage::new(PackageId::new("libs/shell"));
        let mut ctx = ResolveContext {
            project: &project,
            features: &mut features,
            apis: &mut apis,
            filter: &filter,
            known: &known,
            generation: 0,
        };
        let res = bpkg.resolve(&mut ctx).unwrap();

        assert!(res.new_features);
        // The SHELL-gated dependency is only seen on the next resolve.
        assert!(res.discovered.is_empty());
        assert!(features.contains("SHELL"));
    }

    #[test]
    fn test_apis_register_and_satisfy() {
        let fx = ProjectFixture::new()
            .lib("libs/net", "[build]\napis = [\"net\"]\n")
            .lib("apps/web", "[build]\nreq_apis = [\"net\"]\n");
        let project = fx.load();
        let (mut features, mut apis, filter, known) = ctx_parts();

        let mut web = BuildPackage::new(PackageId::new("apps/web"));
        let mut net = BuildPackage::new(PackageId::new("libs/net"));

        let mut ctx = ResolveContext {
            project: &project,
            features: &mut features,
            apis: &mut apis,
            filter: &filter,
            known: &known,
            generation: 0,
        };

        web.resolve(&mut ctx).unwrap();
        assert!(!web.apis_satisfied(0));

        let res = net.resolve(&mut ctx).unwrap();
        assert!(res.new_deps, "first registration of an API is new");

        web.resolve(&mut ctx).unwrap();
        assert!(web.apis_satisfied(0));
        assert!(web.deps().contains(&PackageId::new("libs/net")));
    }

    #[test]
    fn test_compiler_info_includes_and_feature_defines() {
        let fx = ProjectFixture::new()
            .lib("libs/os", "[build]\ncflags = [\"-Wall\"]\n")
            .file("libs/os/include/os.h", "")
            .file("libs/os/src/os.c", "")
            .lib("libs/util", "")
            .file("libs/util/include/util.h", "");
        let project = fx.load();

        let mut features = FeatureSet::new();
        features.add("LOG");
        let filter = FeatureFilter::new();
        let closure: BTreeSet<_> = [PackageId::new("libs/util")].into();

        let mut bpkg = BuildPackage::new(PackageId::new("libs/os"));
        let mut extra = CompilerInfo::new();
        extra.add_define(Define::flag("KILN_SELFTEST"));
        bpkg.inject(&extra);

        let ci = bpkg
            .compiler_info(&project, &filter, &features, &closure)
            .unwrap();

        let root = fx.root();
        assert_eq!(ci.cflags, ["-Wall"]);
        assert_eq!(
            ci.include_dirs,
            [
                root.join("libs/os/include"),
                root.join("libs/os/src"),
                root.join("libs/util/include"),
            ]
        );
        assert_eq!(ci.define_flags(), ["-DFEATURE_LOG", "-DKILN_SELFTEST"]);
    }
}
