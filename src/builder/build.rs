//! The build orchestrator.
//!
//! A `Builder` owns every piece of state for one build of one target:
//! the resolver, the board settings, the base compiler flags and the
//! toolchain provider. It walks the state machine
//! `Uninitialized -> Prepped -> Compiled -> Linked`, moving to `Failed` on
//! the first error.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::builder::build_manifest::{BuildManifest, PackageEntry, BUILD_MANIFEST_NAME};
use crate::builder::compiler_info::{CompilerInfo, Define};
use crate::builder::errors::{BuildError, BuildResult};
use crate::builder::features::{FEATURE_SELFTEST, FEATURE_TEST};
use crate::builder::resolver::Resolver;
use crate::builder::toolchain::{GccProvider, Toolchain, ToolchainProvider, UnitKind};
use crate::core::{BspPackage, Package, PackageId, Project, Target};
use crate::util::process::{find_executable, ProcessBuilder};
use crate::util::shell::{Shell, Status, Verbosity};

/// Define injected into the package under test.
pub const SELFTEST_DEFINE: &str = "KILN_SELFTEST";

/// Directories skipped when compiling a package's main sources.
const MAIN_IGNORE: &[&str] = &["test", "arch"];

/// Directories skipped when compiling a package's test sources.
const TEST_IGNORE: &[&str] = &["arch"];

/// Directories skipped when compiling architecture sources.
const NESTED_IGNORE: &[&str] = &["test"];

/// Where a build is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Uninitialized,
    Prepped,
    Compiled,
    Linked,
    Failed,
}

/// Orchestrates one build of one target.
pub struct Builder<'a> {
    project: &'a Project,
    target: Target,
    shell: Arc<Shell>,
    timeout: Option<Duration>,

    resolver: Resolver,
    state: BuildState,

    /// Board settings, known after prepare
    bsp: Option<BspPackage>,

    /// Compiler package, known after prepare
    compiler: Option<PackageId>,

    /// Target, app and BSP flags shared by every package
    base_info: CompilerInfo,

    /// Manifests whose modification forces every object to rebuild
    config_deps: Vec<PathBuf>,

    provider: Option<Box<dyn ToolchainProvider + 'a>>,

    /// Archives produced by this build, by package
    archives: Vec<(PackageId, PathBuf)>,
}

impl<'a> Builder<'a> {
    pub fn new(project: &'a Project, target: Target, shell: Arc<Shell>) -> Self {
        Builder {
            project,
            target,
            shell,
            timeout: None,
            resolver: Resolver::new(),
            state: BuildState::Uninitialized,
            bsp: None,
            compiler: None,
            base_info: CompilerInfo::new(),
            config_deps: Vec::new(),
            provider: None,
            archives: Vec::new(),
        }
    }

    /// Limit every spawned compiler, archiver, linker or test process.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `provider` instead of the compiler package's GCC settings.
    pub fn with_provider(mut self, provider: Box<dyn ToolchainProvider + 'a>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn bsp(&self) -> Option<&BspPackage> {
        self.bsp.as_ref()
    }

    pub fn base_info(&self) -> &CompilerInfo {
        &self.base_info
    }

    /// Add a package to the build. Must be called before prepare.
    pub fn add_package(&mut self, id: &PackageId) -> bool {
        self.resolver.add_package(id)
    }

    /// Enable a feature. Must be called before prepare.
    pub fn add_feature(&mut self, feature: &str) -> bool {
        self.resolver.add_feature(feature)
    }

    /// Output directory of this build.
    pub fn bin_dir(&self) -> PathBuf {
        self.project.bin_dir().join(self.target.name())
    }

    /// Object and archive directory of one package.
    pub fn pkg_bin_dir(&self, id: &PackageId) -> PathBuf {
        self.bin_dir().join(id.full_name())
    }

    pub fn archive_path(&self, id: &PackageId) -> PathBuf {
        self.pkg_bin_dir(id).join(format!("{}.a", id.basename()))
    }

    /// Linked application binary.
    pub fn app_elf_path(&self, app: &PackageId) -> PathBuf {
        self.pkg_bin_dir(app).join(format!("{}.elf", app.basename()))
    }

    /// Linked test executable for one package.
    pub fn test_exe_path(&self, id: &PackageId) -> PathBuf {
        self.pkg_bin_dir(id).join(format!("test_{}", id.basename()))
    }

    /// Resolve packages, features and APIs, and compute base flags.
    ///
    /// Calling prepare again after it succeeded does nothing.
    pub fn prepare(&mut self) -> BuildResult<()> {
        match self.state {
            BuildState::Uninitialized => {}
            BuildState::Failed => {
                return Err(BuildError::config(format!(
                    "build of target `{}` already failed",
                    self.target.full_name()
                )))
            }
            _ => return Ok(()),
        }

        let result = self.prepare_inner();
        self.finish_step(result, BuildState::Prepped)
    }

    fn prepare_inner(&mut self) -> BuildResult<()> {
        let project = self.project;

        let Some(bsp_name) = self.target.bsp_name() else {
            return Err(BuildError::config("BSP package not specified by target"));
        };
        let Some(bsp_pkg) = project.package(bsp_name) else {
            return Err(BuildError::config(format!("BSP package not found: {}", bsp_name)));
        };
        let mut bsp = BspPackage::new(bsp_pkg).map_err(BuildError::config_from)?;

        let Some(compiler_name) = bsp.compiler_name.clone() else {
            return Err(BuildError::config("Compiler package not specified by BSP"));
        };
        let Some(compiler_pkg) = project.package(&compiler_name) else {
            return Err(BuildError::config(format!(
                "Compiler package not found: {}",
                compiler_name
            )));
        };

        let app_pkg = match self.target.app_name() {
            Some(name) => Some(
                project
                    .package(name)
                    .ok_or_else(|| BuildError::config(format!("App package not found: {}", name)))?,
            ),
            None => None,
        };

        // Filters are consulted in declaration order: BSP, app, target.
        self.resolver.filter_mut().add_package(bsp_pkg)?;
        if let Some(app) = app_pkg {
            self.resolver.filter_mut().add_package(app)?;
        }
        self.resolver.filter_mut().add_package(self.target.package())?;

        if let Some(app) = app_pkg {
            self.resolver.add_package(app.package_id());
        }
        self.resolver.add_package(bsp_pkg.package_id());
        self.resolver.add_package(self.target.package_id());

        self.shell.verbose(format!(
            "Resolving dependencies for target {}",
            self.target.full_name()
        ));
        self.resolver.resolve(project)?;
        for conflict in self.resolver.apis().conflicts() {
            self.shell.warn(conflict);
        }
        self.resolver.log_dep_info();
        self.resolver.verify_apis_satisfied()?;

        // Base flags, lowest priority first.
        let mut base = CompilerInfo::new();
        base.merge(&self.package_info(self.target.package_id())?);
        if let Some(app) = app_pkg {
            base.merge(&self.package_info(app.package_id())?);
        }
        let mut bsp_info = self.package_info(bsp_pkg.package_id())?;
        bsp_info.add_define(Define::flag(format!("ARCH_{}", bsp.arch)));
        bsp_info.add_define(Define::string("BSP_NAME", bsp_pkg.package_id().basename()));
        if let Some(app) = app_pkg {
            bsp_info.add_define(Define::string("APP_NAME", app.package_id().basename()));
        }
        base.merge(&bsp_info);

        let bsp_features = self
            .resolver
            .filter()
            .visible_features(bsp_pkg.full_name(), self.resolver.features());
        bsp.reload(&bsp_features).map_err(BuildError::config_from)?;
        if bsp.linker_script.is_some() {
            base.linker_script = bsp.linker_script.clone();
        }

        let config_deps = self.manifest_deps(compiler_pkg);
        tracing::debug!(
            "Base flags for target {}: {:?}",
            self.target.full_name(),
            base
        );

        if self.provider.is_none() {
            let settings = compiler_pkg.manifest().compiler.clone().unwrap_or_default();
            let provider = GccProvider::from_settings(&settings, self.target.build_profile())
                .with_timeout(self.timeout);
            match find_executable(&provider.cc.to_string_lossy()) {
                Some(cc) => tracing::debug!("Using C compiler {}", cc.display()),
                None => tracing::debug!("C compiler `{}` not found in PATH", provider.cc.display()),
            }
            self.provider = Some(Box::new(provider));
        }

        self.base_info = base;
        self.config_deps = config_deps;
        self.bsp = Some(bsp);
        self.compiler = Some(compiler_pkg.package_id().clone());
        Ok(())
    }

    /// Flags a package contributes on its own.
    fn package_info(&self, id: &PackageId) -> BuildResult<CompilerInfo> {
        let Some(bpkg) = self.resolver.package(id) else {
            return Err(BuildError::config(format!("package not in build: {}", id)));
        };
        let closure = self.resolver.dep_closure(id);
        bpkg.compiler_info(
            self.project,
            self.resolver.filter(),
            self.resolver.features(),
            &closure,
        )
    }

    /// Manifest files of every package in the build, plus the compiler's.
    fn manifest_deps(&self, compiler: &Package) -> Vec<PathBuf> {
        let mut deps: Vec<PathBuf> = self
            .resolver
            .package_ids()
            .filter_map(|id| self.project.package_by_id(id))
            .flat_map(|pkg| pkg.cfg_filenames())
            .collect();
        deps.extend(compiler.cfg_filenames());
        deps
    }

    fn finish_step(&mut self, result: BuildResult<()>, next: BuildState) -> BuildResult<()> {
        match result {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                self.state = BuildState::Failed;
                Err(e)
            }
        }
    }

    fn provider(&self) -> BuildResult<&(dyn ToolchainProvider + 'a)> {
        self.provider
            .as_deref()
            .ok_or_else(|| BuildError::config("build has not been prepared"))
    }

    fn arch(&self) -> BuildResult<&str> {
        self.bsp
            .as_ref()
            .map(|bsp| bsp.arch.as_str())
            .ok_or_else(|| BuildError::config("build has not been prepared"))
    }

    /// Source roots of a package.
    ///
    /// Declared directories must exist; otherwise `src` is used when present.
    fn source_roots(&self, package: &Package) -> BuildResult<Vec<PathBuf>> {
        let declared = package.source_directories();
        if !declared.is_empty() {
            for dir in &declared {
                if !dir.is_dir() {
                    return Err(BuildError::config(format!(
                        "source directory `{}` of package `{}` does not exist",
                        dir.display(),
                        package.full_name()
                    )));
                }
            }
            return Ok(declared);
        }

        let src = package.root().join("src");
        Ok(if src.is_dir() { vec![src] } else { Vec::new() })
    }

    /// Compile the C sources of `root`, then its `arch/<arch>` sources.
    fn compile_root(
        &self,
        toolchain: &mut dyn Toolchain,
        root: &Path,
        ignore: &[&str],
    ) -> anyhow::Result<()> {
        toolchain.recursive_compile(root, UnitKind::C, ignore)?;

        let arch_dir = root.join("arch").join(self.arch()?);
        if arch_dir.is_dir() {
            toolchain.recursive_compile(&arch_dir, UnitKind::C, NESTED_IGNORE)?;
            toolchain.recursive_compile(&arch_dir, UnitKind::Asm, NESTED_IGNORE)?;
        }
        Ok(())
    }

    /// Compile and archive one package.
    ///
    /// Returns the archive path, or None when the package has no sources.
    pub fn build_package(&self, id: &PackageId) -> BuildResult<Option<PathBuf>> {
        let Some(package) = self.project.package_by_id(id) else {
            return Err(BuildError::config(format!("package not found: {}", id)));
        };

        let roots = self.source_roots(package)?;
        if roots.is_empty() {
            tracing::debug!("Package {} has no sources", id);
            return Ok(None);
        }

        let mut info = self.base_info.clone();
        info.merge(&self.package_info(id)?);
        tracing::debug!("Flags for {}: {:?}", id, info);

        let pkg_dir = self.pkg_bin_dir(id);
        let mut toolchain = self.provider()?.new_toolchain(&pkg_dir, package.root());
        toolchain.add_info(&info);
        toolchain.add_deps(&self.config_deps);

        let test_enabled = self.resolver.features().contains(FEATURE_TEST);
        let compile = |toolchain: &mut dyn Toolchain| -> anyhow::Result<bool> {
            for root in &roots {
                self.compile_root(toolchain, root, MAIN_IGNORE)?;

                let test_root = root.join("test");
                if test_enabled && test_root.is_dir() {
                    self.compile_root(toolchain, &test_root, TEST_IGNORE)?;
                }
            }
            toolchain.archive(&self.archive_path(id))
        };

        match compile(toolchain.as_mut()) {
            Ok(true) => Ok(Some(self.archive_path(id))),
            Ok(false) => Ok(None),
            Err(source) => Err(BuildError::Compile {
                package: id.full_name().to_string(),
                source,
            }),
        }
    }

    /// Compile every package in name order.
    fn compile_all(&mut self) -> BuildResult<()> {
        let ids: Vec<PackageId> = self.resolver.package_ids().cloned().collect();
        let progress = self.shell.progress(ids.len() as u64, "Compiling");

        let mut archives = Vec::new();
        for id in &ids {
            progress.tick(id);
            self.shell.status_at(Verbosity::Verbose, Status::Compiling, id);
            if let Some(archive) = self.build_package(id)? {
                archives.push((id.clone(), archive));
            }
        }
        progress.finish();

        self.archives = archives;
        Ok(())
    }

    /// Link every package archive found on disk into `output`.
    pub fn link(&self, output: &Path) -> BuildResult<()> {
        let archives: Vec<PathBuf> = self
            .resolver
            .package_ids()
            .map(|id| self.archive_path(id))
            .filter(|path| path.is_file())
            .collect();

        self.shell.status(Status::Linking, output.display());

        let link_err = |source: anyhow::Error| BuildError::Link {
            output: output.to_path_buf(),
            source,
        };

        let mut toolchain = self
            .provider()?
            .new_toolchain(&self.bin_dir(), self.project.root());
        toolchain.add_info(&self.base_info);
        toolchain
            .link(output, &archives, self.base_info.linker_script.as_deref())
            .map_err(link_err)
    }

    /// Build the target's application.
    ///
    /// Returns the path of the linked binary.
    pub fn build(&mut self) -> BuildResult<PathBuf> {
        self.target
            .validate(self.project, true)
            .map_err(BuildError::config_from)?;
        self.prepare()?;

        let Some(app_id) = self
            .target
            .app(self.project)
            .map(|app| app.package_id().clone())
        else {
            return Err(BuildError::config("App package not specified by target"));
        };

        let result = self.compile_all();
        self.finish_step(result, BuildState::Compiled)?;

        let output = self.app_elf_path(&app_id);
        let result = self.link(&output);
        self.finish_step(result, BuildState::Linked)?;

        self.write_manifest(&output)?;
        Ok(output)
    }

    /// Build and run the self tests of one package.
    pub fn test(&mut self, package_name: &str) -> BuildResult<()> {
        let Some(package) = self.project.package(package_name) else {
            return Err(BuildError::config(format!("package not found: {}", package_name)));
        };
        let id = package.package_id().clone();

        self.add_package(&id);
        self.add_feature(FEATURE_TEST);
        self.add_feature(FEATURE_SELFTEST);

        self.target
            .validate(self.project, false)
            .map_err(BuildError::config_from)?;
        self.prepare()?;

        let mut selftest = CompilerInfo::new();
        selftest.add_define(Define::flag(SELFTEST_DEFINE));
        if let Some(bpkg) = self.resolver.package_mut(&id) {
            bpkg.inject(&selftest);
        }

        let result = self.compile_all();
        self.finish_step(result, BuildState::Compiled)?;

        let exe = self.test_exe_path(&id);
        let result = self.link(&exe);
        self.finish_step(result, BuildState::Linked)?;

        self.run_test(&id, &exe)
    }

    fn run_test(&self, id: &PackageId, exe: &Path) -> BuildResult<()> {
        self.shell.status(Status::Testing, id);

        let output = ProcessBuilder::new(exe)
            .cwd(self.pkg_bin_dir(id))
            .timeout(self.timeout)
            .exec();

        let failure = |output: String| BuildError::TestFailure {
            package: id.full_name().to_string(),
            output,
        };

        match output {
            Ok(out) if out.status.success() => {
                self.shell.status(Status::Passed, id);
                Ok(())
            }
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                Err(failure(text))
            }
            Err(e) => Err(failure(format!("{:#}", e))),
        }
    }

    /// Remove this build's output directory.
    pub fn clean(&self) -> BuildResult<()> {
        let dir = self.bin_dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                self.shell.status(Status::Removed, dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::filesystem("remove", dir, e)),
        }
    }

    fn write_manifest(&self, output: &Path) -> BuildResult<()> {
        let Some(bsp) = self.bsp.as_ref() else {
            return Ok(());
        };

        let built: BTreeSet<&PackageId> = self.archives.iter().map(|(id, _)| id).collect();
        let packages = self
            .resolver
            .packages()
            .map(|bpkg| PackageEntry {
                name: bpkg.name().to_string(),
                archive: built
                    .contains(bpkg.id())
                    .then(|| self.archive_path(bpkg.id())),
                deps: bpkg.deps().iter().map(|d| d.to_string()).collect(),
                apis: bpkg.apis().iter().cloned().collect(),
                req_apis: bpkg.req_apis().map(str::to_string).collect(),
            })
            .collect();

        let manifest = BuildManifest {
            target: self.target.full_name().to_string(),
            app: self.target.app_name().map(str::to_string),
            bsp: bsp.name().to_string(),
            arch: bsp.arch.clone(),
            build_profile: self.target.build_profile().to_string(),
            features: self.resolver.features().iter().map(str::to_string).collect(),
            packages,
            apis: self
                .resolver
                .apis()
                .iter()
                .map(|(api, id)| (api.to_string(), id.to_string()))
                .collect(),
            output: output.to_path_buf(),
        };

        manifest.write(&self.bin_dir().join(BUILD_MANIFEST_NAME))
    }
}
