//! Build features and feature filtering.
//!
//! Features are build-wide boolean switches. Whether a given package sees a
//! feature is decided by the blacklist/whitelist entries contributed by the
//! BSP, the app and the target.

use std::collections::BTreeSet;

use regex::Regex;

use crate::builder::errors::{BuildError, BuildResult};
use crate::core::Package;

/// Feature that compiles each package's `test` subtree.
pub const FEATURE_TEST: &str = "TEST";

/// Feature signalling that no application supplies the entry point.
pub const FEATURE_SELFTEST: &str = "SELFTEST";

/// The set of features enabled in one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    features: BTreeSet<String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        FeatureSet::default()
    }

    /// Enable a feature. Returns true if it was not already enabled.
    pub fn add(&mut self, feature: impl Into<String>) -> bool {
        self.features.insert(feature.into())
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }
}

/// One blacklist or whitelist entry.
#[derive(Debug, Clone)]
pub struct FilterEntry {
    /// Pattern matched against package full names
    pub pattern: Regex,
    /// Feature the entry applies to
    pub feature: String,
}

impl FilterEntry {
    pub fn new(pattern: &str, feature: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(FilterEntry {
            pattern: Regex::new(pattern)?,
            feature: feature.into(),
        })
    }

    fn matches(&self, package_name: &str, feature: &str) -> bool {
        self.pattern.is_match(package_name) && self.feature == feature
    }
}

/// Scan `list` in order for an entry matching the package and feature.
pub fn match_feature(list: &[FilterEntry], package_name: &str, feature: &str) -> bool {
    list.iter().any(|entry| entry.matches(package_name, feature))
}

/// The concatenated feature blacklist and whitelist of a build.
#[derive(Debug, Clone, Default)]
pub struct FeatureFilter {
    blacklist: Vec<FilterEntry>,
    whitelist: Vec<FilterEntry>,
}

impl FeatureFilter {
    pub fn new() -> Self {
        FeatureFilter::default()
    }

    /// Append the entries a package declares.
    pub fn add_package(&mut self, package: &Package) -> BuildResult<()> {
        let manifest = package.manifest();
        for spec in &manifest.feature_blacklist {
            let entry = compile_entry(package, &spec.package, &spec.feature)?;
            self.blacklist.push(entry);
        }
        for spec in &manifest.feature_whitelist {
            let entry = compile_entry(package, &spec.package, &spec.feature)?;
            self.whitelist.push(entry);
        }
        Ok(())
    }

    pub fn add_blacklist(&mut self, entry: FilterEntry) {
        self.blacklist.push(entry);
    }

    pub fn add_whitelist(&mut self, entry: FilterEntry) {
        self.whitelist.push(entry);
    }

    /// Whether `feature` is permitted for the named package.
    ///
    /// A whitelist match always re-admits a blacklisted feature, regardless
    /// of which entry was declared first.
    pub fn is_feature_valid(&self, package_name: &str, feature: &str) -> bool {
        if !match_feature(&self.blacklist, package_name, feature) {
            return true;
        }
        match_feature(&self.whitelist, package_name, feature)
    }

    /// The subset of `features` visible to the named package.
    pub fn visible_features(&self, package_name: &str, features: &FeatureSet) -> BTreeSet<String> {
        features
            .iter()
            .filter(|f| self.is_feature_valid(package_name, f))
            .map(str::to_string)
            .collect()
    }
}

fn compile_entry(package: &Package, pattern: &str, feature: &str) -> BuildResult<FilterEntry> {
    FilterEntry::new(pattern, feature).map_err(|e| {
        BuildError::config(format!(
            "invalid feature filter pattern `{}` in package `{}`: {}",
            pattern,
            package.full_name(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str, feature: &str) -> FilterEntry {
        FilterEntry::new(pattern, feature).unwrap()
    }

    #[test]
    fn test_feature_set_add_reports_new() {
        let mut set = FeatureSet::new();
        assert!(set.add("SHELL"));
        assert!(!set.add("SHELL"));
        assert!(set.contains("SHELL"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_match_requires_pattern_and_feature() {
        let list = vec![entry("^libs/", "SHELL")];

        assert!(match_feature(&list, "libs/os", "SHELL"));
        assert!(!match_feature(&list, "libs/os", "LOG"));
        assert!(!match_feature(&list, "apps/blinky", "SHELL"));
    }

    #[test]
    fn test_pattern_is_unanchored() {
        let list = vec![entry("os", "SHELL")];
        assert!(match_feature(&list, "libs/os", "SHELL"));
        assert!(match_feature(&list, "hw/mcu/oscillator", "SHELL"));
    }

    #[test]
    fn test_blacklist_without_whitelist() {
        let mut filter = FeatureFilter::new();
        filter.add_blacklist(entry("^libs/", "X"));

        assert!(!filter.is_feature_valid("libs/os", "X"));
        assert!(filter.is_feature_valid("apps/blinky", "X"));
        assert!(filter.is_feature_valid("libs/os", "Y"));
    }

    #[test]
    fn test_whitelist_carves_exception() {
        let mut filter = FeatureFilter::new();
        filter.add_blacklist(entry("^libs/", "X"));
        filter.add_whitelist(entry("^libs/os$", "X"));

        assert!(filter.is_feature_valid("libs/os", "X"));
        assert!(!filter.is_feature_valid("libs/util", "X"));
    }

    #[test]
    fn test_whitelist_alone_has_no_effect() {
        let mut filter = FeatureFilter::new();
        filter.add_whitelist(entry("^libs/os$", "X"));

        assert!(filter.is_feature_valid("libs/os", "X"));
        assert!(filter.is_feature_valid("libs/util", "X"));
    }

    #[test]
    fn test_visible_features() {
        let mut filter = FeatureFilter::new();
        filter.add_blacklist(entry("^libs/", "SHELL"));

        let mut features = FeatureSet::new();
        features.add("SHELL");
        features.add("LOG");

        let visible = filter.visible_features("libs/os", &features);
        assert_eq!(visible.into_iter().collect::<Vec<_>>(), ["LOG"]);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(FilterEntry::new("(", "X").is_err());
    }
}
