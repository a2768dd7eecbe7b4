//! Test utilities and mocks for Kiln unit tests.
//!
//! `ProjectFixture` writes real project trees into temporary directories.
//! `MockProvider` stands in for a compiler: it records every call the
//! builder makes and fakes archives and executables on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::test_support::{MockProvider, ProjectFixture};
//!
//! let fx = ProjectFixture::new().lib("libs/os", "").file("libs/os/src/os.c", "");
//! let mock = MockProvider::new();
//! let builder = Builder::new(&fx.load(), target, shell).with_provider(Box::new(mock.clone()));
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::builder::compiler_info::CompilerInfo;
use crate::builder::toolchain::{Toolchain, ToolchainProvider, UnitKind};
use crate::util::fs::{walk_files, write_string};

pub use fixtures::*;

/// One recorded link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLink {
    pub output: PathBuf,
    pub archives: Vec<PathBuf>,
    pub linker_script: Option<PathBuf>,
}

/// A call made on a mock toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Compile {
        /// Package directory the toolchain was created for
        base_dir: PathBuf,
        root: PathBuf,
        kind: UnitKind,
        sources: Vec<PathBuf>,
    },
    Archive {
        output: PathBuf,
        created: bool,
    },
    Link(MockLink),
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<MockEvent>,
    /// Settings of each toolchain, by creation order
    infos: Vec<(PathBuf, CompilerInfo)>,
}

/// Recording toolchain provider.
///
/// Clones share their recordings, so a test can keep one handle while the
/// builder owns another.
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    test_exit: i32,
    test_output: String,
}

impl MockProvider {
    /// A provider whose linked executables exit successfully.
    pub fn new() -> Self {
        MockProvider {
            state: Arc::new(Mutex::new(MockState::default())),
            test_exit: 0,
            test_output: String::new(),
        }
    }

    /// Make linked executables print `output` and exit with `code`.
    pub fn with_test_exit(mut self, code: i32, output: &str) -> Self {
        self.test_exit = code;
        self.test_output = output.to_string();
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn links(&self) -> Vec<MockLink> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Link(link) => Some(link.clone()),
                _ => None,
            })
            .collect()
    }

    /// Final settings of every toolchain, keyed by its base directory.
    pub fn infos(&self) -> Vec<(PathBuf, CompilerInfo)> {
        self.state().infos.clone()
    }

    /// Base directories of toolchains that compiled at least one source,
    /// in first-compile order.
    pub fn compiled_packages(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for event in &self.state().events {
            if let MockEvent::Compile { base_dir, sources, .. } = event {
                if !sources.is_empty() && !dirs.contains(base_dir) {
                    dirs.push(base_dir.clone());
                }
            }
        }
        dirs
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolchainProvider for MockProvider {
    fn new_toolchain(&self, _obj_dir: &Path, base_dir: &Path) -> Box<dyn Toolchain> {
        let index = {
            let mut state = self.state();
            state.infos.push((base_dir.to_path_buf(), CompilerInfo::new()));
            state.infos.len() - 1
        };

        Box::new(MockToolchain {
            provider: self.clone(),
            index,
            base_dir: base_dir.to_path_buf(),
            sources: 0,
        })
    }
}

/// Toolchain created by `MockProvider`.
#[derive(Debug)]
pub struct MockToolchain {
    provider: MockProvider,
    index: usize,
    base_dir: PathBuf,
    /// Sources seen so far
    sources: usize,
}

impl Toolchain for MockToolchain {
    fn add_info(&mut self, info: &CompilerInfo) {
        self.provider.state().infos[self.index].1.merge(info);
    }

    fn add_deps(&mut self, deps: &[PathBuf]) {
        self.provider.state().infos[self.index]
            .1
            .extra_deps
            .extend(deps.iter().cloned());
    }

    fn recursive_compile(&mut self, src_root: &Path, kind: UnitKind, ignore: &[&str]) -> Result<()> {
        let sources = walk_files(src_root, ignore, |p| kind.matches(p))?;
        self.sources += sources.len();
        self.provider.state().events.push(MockEvent::Compile {
            base_dir: self.base_dir.clone(),
            root: src_root.to_path_buf(),
            kind,
            sources,
        });
        Ok(())
    }

    fn archive(&mut self, output: &Path) -> Result<bool> {
        let created = self.sources > 0;
        if created {
            write_string(output, "!<arch>\n")?;
        }
        self.provider.state().events.push(MockEvent::Archive {
            output: output.to_path_buf(),
            created,
        });
        Ok(created)
    }

    fn link(&mut self, output: &Path, archives: &[PathBuf], linker_script: Option<&Path>) -> Result<()> {
        let script = format!(
            "#!/bin/sh\necho '{}'\nexit {}\n",
            self.provider.test_output, self.provider.test_exit
        );
        write_string(output, &script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(output, std::fs::Permissions::from_mode(0o755))?;
        }

        self.provider.state().events.push(MockEvent::Link(MockLink {
            output: output.to_path_buf(),
            archives: archives.to_vec(),
            linker_script: linker_script.map(Path::to_path_buf),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_and_fakes_archive() {
        let fx = ProjectFixture::new()
            .file("libs/os/src/os.c", "")
            .file("libs/os/src/test/test_os.c", "");
        let mock = MockProvider::new();
        let pkg = fx.root().join("libs/os");

        let mut tc = mock.new_toolchain(&fx.root().join("bin/os"), &pkg);
        tc.recursive_compile(&pkg.join("src"), UnitKind::C, &["test"])
            .unwrap();
        let archive = fx.root().join("bin/os/os.a");
        assert!(tc.archive(&archive).unwrap());
        assert!(archive.is_file());

        assert_eq!(mock.compiled_packages(), [pkg.clone()]);
        match &mock.events()[0] {
            MockEvent::Compile { sources, .. } => {
                assert_eq!(sources, &[pkg.join("src/os.c")]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_mock_without_sources_creates_nothing() {
        let fx = ProjectFixture::new();
        let mock = MockProvider::new();

        let mut tc = mock.new_toolchain(fx.root(), fx.root());
        let archive = fx.root().join("empty.a");
        assert!(!tc.archive(&archive).unwrap());
        assert!(!archive.exists());
        assert!(mock.compiled_packages().is_empty());
    }
}
