//! Fixpoint resolution of dependencies, features and APIs.
//!
//! Resolution repeatedly walks every package in the build until a full pass
//! learns nothing new. Packages are visited in name order, so the outcome
//! (including which package wins an API conflict) is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::builder::build_package::{BuildPackage, ResolveContext};
use crate::builder::errors::{BuildError, BuildResult, UnsatisfiedApi};
use crate::builder::features::{FeatureFilter, FeatureSet};
use crate::core::{PackageId, Project};

/// A second package claiming an already registered API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConflict {
    pub api: String,
    /// Package that keeps the API
    pub owner: PackageId,
    /// Package whose registration was ignored
    pub rejected: PackageId,
}

impl fmt::Display for ApiConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API conflict: {} ({} <-> {})", self.api, self.owner, self.rejected)
    }
}

/// Map from API name to the package providing it.
///
/// The first registration wins.
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    providers: BTreeMap<String, PackageId>,
    conflicts: Vec<ApiConflict>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        ApiRegistry::default()
    }

    /// Register `owner` as the provider of `api`.
    ///
    /// Returns true only for a first registration. A later claim by a
    /// different package is recorded as a conflict and ignored.
    pub fn add(&mut self, api: &str, owner: &PackageId) -> bool {
        match self.providers.get(api) {
            None => {
                self.providers.insert(api.to_string(), owner.clone());
                true
            }
            Some(existing) if existing == owner => false,
            Some(existing) => {
                let conflict = ApiConflict {
                    api: api.to_string(),
                    owner: existing.clone(),
                    rejected: owner.clone(),
                };
                if !self.conflicts.contains(&conflict) {
                    tracing::debug!("{}", conflict);
                    self.conflicts.push(conflict);
                }
                false
            }
        }
    }

    pub fn provider(&self, api: &str) -> Option<&PackageId> {
        self.providers.get(api)
    }

    /// Registered APIs and their providers, by API name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageId)> {
        self.providers.iter().map(|(api, id)| (api.as_str(), id))
    }

    pub fn conflicts(&self) -> &[ApiConflict] {
        &self.conflicts
    }
}

/// Build-wide resolution state.
#[derive(Debug, Default)]
pub struct Resolver {
    packages: BTreeMap<PackageId, BuildPackage>,
    features: FeatureSet,
    apis: ApiRegistry,
    filter: FeatureFilter,

    /// Bumped whenever a new feature invalidates prior resolution
    generation: u64,

    /// Passes run by the last `resolve` call
    passes: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver::default()
    }

    /// Add a package to the build. Returns true if it was not already present.
    pub fn add_package(&mut self, id: &PackageId) -> bool {
        if self.packages.contains_key(id) {
            return false;
        }
        self.packages
            .insert(id.clone(), BuildPackage::new(id.clone()));
        true
    }

    /// Enable a feature ahead of resolution.
    pub fn add_feature(&mut self, feature: &str) -> bool {
        let added = self.features.add(feature);
        if added {
            self.generation += 1;
        }
        added
    }

    pub fn package(&self, id: &PackageId) -> Option<&BuildPackage> {
        self.packages.get(id)
    }

    pub fn package_mut(&mut self, id: &PackageId) -> Option<&mut BuildPackage> {
        self.packages.get_mut(id)
    }

    /// Packages in the build, by name.
    pub fn packages(&self) -> impl Iterator<Item = &BuildPackage> {
        self.packages.values()
    }

    pub fn package_ids(&self) -> impl Iterator<Item = &PackageId> {
        self.packages.keys()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn apis(&self) -> &ApiRegistry {
        &self.apis
    }

    pub fn filter(&self) -> &FeatureFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FeatureFilter {
        &mut self.filter
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Run resolution passes until nothing changes.
    pub fn resolve(&mut self, project: &Project) -> BuildResult<()> {
        self.passes = 0;

        loop {
            self.passes += 1;
            if !self.resolve_pass(project)? {
                break;
            }
        }

        tracing::debug!(
            "Resolved {} packages in {} passes",
            self.packages.len(),
            self.passes
        );
        Ok(())
    }

    /// Visit every package once. Returns true if another pass is needed.
    ///
    /// A newly enabled feature invalidates every package and ends the pass
    /// at once, since it may change any package's settings. New
    /// dependencies or API registrations only schedule another full pass.
    fn resolve_pass(&mut self, project: &Project) -> BuildResult<bool> {
        let mut reprocess = false;

        // Packages added during this pass are visited in the next one.
        let ids: Vec<PackageId> = self.packages.keys().cloned().collect();
        for id in ids {
            let Some(mut bpkg) = self.packages.remove(&id) else {
                continue;
            };

            let result = {
                let mut ctx = ResolveContext {
                    project,
                    features: &mut self.features,
                    apis: &mut self.apis,
                    filter: &self.filter,
                    known: &self.packages,
                    generation: self.generation,
                };
                bpkg.resolve(&mut ctx)
            };
            self.packages.insert(id, bpkg);
            let resolution = result?;

            for dep in resolution.discovered {
                self.add_package(&dep);
            }

            if resolution.new_features {
                self.generation += 1;
                return Ok(true);
            }
            if resolution.new_deps {
                reprocess = true;
            }
        }

        Ok(reprocess)
    }

    /// Every (package, API) requirement without a provider, sorted.
    pub fn unsatisfied_apis(&self) -> Vec<UnsatisfiedApi> {
        let mut unsatisfied = Vec::new();
        for bpkg in self.packages.values() {
            for api in bpkg.req_apis() {
                if self.apis.provider(api).is_none() {
                    unsatisfied.push(UnsatisfiedApi {
                        package: bpkg.name().to_string(),
                        api: api.to_string(),
                    });
                }
            }
        }
        unsatisfied.sort();
        unsatisfied
    }

    /// Fail if any required API is left unsatisfied.
    pub fn verify_apis_satisfied(&self) -> BuildResult<()> {
        let unsatisfied = self.unsatisfied_apis();
        if unsatisfied.is_empty() {
            Ok(())
        } else {
            Err(BuildError::UnsatisfiedApi { unsatisfied })
        }
    }

    /// All packages reachable from `id` through dependencies, excluding `id`.
    pub fn dep_closure(&self, id: &PackageId) -> BTreeSet<PackageId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&PackageId> = match self.packages.get(id) {
            Some(bpkg) => bpkg.deps().iter().collect(),
            None => return seen,
        };

        while let Some(next) = stack.pop() {
            if next == id || !seen.insert(next.clone()) {
                continue;
            }
            if let Some(bpkg) = self.packages.get(next) {
                stack.extend(bpkg.deps().iter());
            }
        }
        seen
    }

    /// Log each package's dependencies and APIs at debug level.
    pub fn log_dep_info(&self) {
        for bpkg in self.packages.values() {
            tracing::debug!("Package {}:", bpkg.id());
            for dep in bpkg.deps() {
                tracing::debug!("    dep: {}", dep);
            }
            for api in bpkg.apis() {
                tracing::debug!("    provides: {}", api);
            }
            for api in bpkg.req_apis() {
                match self.apis.provider(api) {
                    Some(provider) => tracing::debug!("    requires: {} ({})", api, provider),
                    None => tracing::debug!("    requires: {} (unsatisfied)", api),
                }
            }
        }
    }
}
