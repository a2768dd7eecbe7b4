//! Aggregated compiler settings.
//!
//! A CompilerInfo is built up by merging the contributions of several
//! packages. Additive categories (defines, flags, include paths, extra
//! dependency files) accumulate in merge order without deduplication;
//! overwritable categories (the linker script) are replaced by the latest
//! merge that sets them.

use std::path::PathBuf;

use serde::Serialize;

/// A preprocessor define.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Define {
    /// Simple flag: -DFOO
    Flag(String),
    /// Key-value: -DFOO=bar
    KeyValue { name: String, value: String },
}

impl Define {
    /// Create a simple flag define.
    pub fn flag(name: impl Into<String>) -> Self {
        Define::Flag(name.into())
    }

    /// Create a key-value define.
    pub fn key_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define::KeyValue {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A define whose value is a C string literal.
    pub fn string(name: impl Into<String>, value: &str) -> Self {
        Define::key_value(name, format!("\"{}\"", value))
    }

    /// Get the define name.
    pub fn name(&self) -> &str {
        match self {
            Define::Flag(n) => n,
            Define::KeyValue { name, .. } => name,
        }
    }

    /// Convert to compiler flag format.
    pub fn to_flag(&self) -> String {
        match self {
            Define::Flag(name) => format!("-D{}", name),
            Define::KeyValue { name, value } => format!("-D{}={}", name, value),
        }
    }
}

/// Mergeable bag of compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilerInfo {
    /// Preprocessor defines
    pub defines: Vec<Define>,

    /// C compiler flags
    pub cflags: Vec<String>,

    /// Linker flags
    pub lflags: Vec<String>,

    /// Assembler flags
    pub aflags: Vec<String>,

    /// Include directories (-I)
    pub include_dirs: Vec<PathBuf>,

    /// Linker script; later merges replace earlier ones
    pub linker_script: Option<PathBuf>,

    /// Files whose modification forces recompilation
    pub extra_deps: Vec<PathBuf>,
}

impl CompilerInfo {
    pub fn new() -> Self {
        CompilerInfo::default()
    }

    /// Merge `other` on top of this one.
    pub fn merge(&mut self, other: &CompilerInfo) {
        self.defines.extend(other.defines.iter().cloned());
        self.cflags.extend(other.cflags.iter().cloned());
        self.lflags.extend(other.lflags.iter().cloned());
        self.aflags.extend(other.aflags.iter().cloned());
        self.include_dirs.extend(other.include_dirs.iter().cloned());
        self.extra_deps.extend(other.extra_deps.iter().cloned());

        if other.linker_script.is_some() {
            self.linker_script = other.linker_script.clone();
        }
    }

    pub fn add_define(&mut self, define: Define) {
        self.defines.push(define);
    }

    /// Whether a define with the given name is present.
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d.name() == name)
    }

    /// Defines rendered as `-D` flags, in merge order.
    pub fn define_flags(&self) -> Vec<String> {
        self.defines.iter().map(Define::to_flag).collect()
    }
}
