//! Toolchain abstraction.
//!
//! The builder drives compilation through the `Toolchain` trait: it merges
//! compiler settings into a toolchain, asks it to compile whole source trees,
//! and then to archive or link the results. A `ToolchainProvider` creates one
//! toolchain per object directory, so per-package state never leaks between
//! packages.
//!
//! All directories are passed explicitly; a toolchain never relies on the
//! process working directory.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::compiler_info::CompilerInfo;

mod gcc;

pub use gcc::{GccProvider, GccToolchain};

/// Kind of source unit to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// C sources (`*.c`)
    C,
    /// Assembly sources (`*.s`, `*.S`)
    Asm,
}

impl UnitKind {
    /// File extensions selecting this kind of unit.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            UnitKind::C => &["c"],
            UnitKind::Asm => &["s", "S"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::C => "c",
            UnitKind::Asm => "asm",
        }
    }

    /// Whether `path` is a source of this kind.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions().contains(&ext))
            .unwrap_or(false)
    }
}

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "arm-none-eabi-ar")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// The full command line as one string.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Compiles, archives and links on behalf of the builder.
pub trait Toolchain {
    /// Merge compiler settings into this toolchain.
    fn add_info(&mut self, info: &CompilerInfo);

    /// Register files whose modification forces recompilation.
    fn add_deps(&mut self, deps: &[PathBuf]);

    /// Compile every unit of `kind` below `src_root`, skipping directories
    /// named in `ignore` at any depth.
    fn recursive_compile(&mut self, src_root: &Path, kind: UnitKind, ignore: &[&str])
        -> Result<()>;

    /// Archive every object this toolchain produced into `output`.
    ///
    /// Returns false, creating nothing, when there are no objects.
    fn archive(&mut self, output: &Path) -> Result<bool>;

    /// Link `archives` into the executable `output`.
    fn link(&mut self, output: &Path, archives: &[PathBuf], linker_script: Option<&Path>)
        -> Result<()>;
}

/// Creates toolchains bound to an object directory.
pub trait ToolchainProvider {
    /// A toolchain writing objects to `obj_dir`, with object paths derived
    /// from source paths relative to `base_dir`.
    fn new_toolchain(&self, obj_dir: &Path, base_dir: &Path) -> Box<dyn Toolchain>;
}
