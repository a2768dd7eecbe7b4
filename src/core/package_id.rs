//! Package identification.
//!
//! A PackageId is the full qualified name of a package (e.g. `hw/bsp/native`).
//! It is the key of every package map in the builder, so two handles to the
//! same package always compare equal regardless of where they were loaded.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A unique identifier for a package within a project.
///
/// Cheap to clone (reference counted) and ordered by name, which gives the
/// builder its deterministic alphabetical iteration order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    name: Arc<str>,
}

impl PackageId {
    /// Create a package ID from a full qualified name.
    pub fn new(name: impl AsRef<str>) -> Self {
        let trimmed = name.as_ref().trim_matches('/');
        PackageId {
            name: Arc::from(trimmed),
        }
    }

    /// The full qualified name.
    pub fn full_name(&self) -> &str {
        &self.name
    }

    /// The last path component of the name (`hw/bsp/native` -> `native`).
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({:?})", &*self.name)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        PackageId::new(s)
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        PackageId::new(s)
    }
}

impl Serialize for PackageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PackageId::new(s))
    }
}
