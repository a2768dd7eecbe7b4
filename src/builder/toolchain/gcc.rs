//! GCC-style toolchain implementation.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::builder::compiler_info::CompilerInfo;
use crate::core::manifest::CompilerSettings;
use crate::util::fs::{ensure_dir, mtime, relative_path, walk_files};
use crate::util::hash::Fingerprint;
use crate::util::process::ProcessBuilder;

use super::{CommandSpec, Toolchain, ToolchainProvider, UnitKind};

/// Extension of the command fingerprint stored next to each object.
const CMD_EXTENSION: &str = "cmd";

/// Programs and default flags of a GCC-compatible compiler package.
#[derive(Debug, Clone)]
pub struct GccProvider {
    /// C compiler, also used as the link driver
    pub cc: PathBuf,
    /// Assembler driver
    pub asm: PathBuf,
    /// Archiver
    pub ar: PathBuf,
    pub cflags: Vec<String>,
    pub aflags: Vec<String>,
    pub lflags: Vec<String>,
    /// Limit on every spawned command
    pub timeout: Option<Duration>,
}

impl GccProvider {
    /// Create a provider from a compiler package's settings.
    ///
    /// Flags of the named build profile are appended to the base flags.
    pub fn from_settings(settings: &CompilerSettings, profile: &str) -> Self {
        let mut cflags = settings.cflags.clone();
        let mut aflags = settings.aflags.clone();
        let mut lflags = settings.lflags.clone();

        if let Some(flags) = settings.profile.get(profile) {
            cflags.extend(flags.cflags.iter().cloned());
            aflags.extend(flags.aflags.iter().cloned());
            lflags.extend(flags.lflags.iter().cloned());
        }

        GccProvider {
            cc: settings.cc.clone(),
            asm: settings.asm.clone().unwrap_or_else(|| settings.cc.clone()),
            ar: settings.ar.clone(),
            cflags,
            aflags,
            lflags,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ToolchainProvider for GccProvider {
    fn new_toolchain(&self, obj_dir: &Path, base_dir: &Path) -> Box<dyn Toolchain> {
        Box::new(GccToolchain::new(self.clone(), obj_dir, base_dir))
    }
}

/// GCC-style toolchain bound to one object directory.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    provider: GccProvider,
    obj_dir: PathBuf,
    base_dir: PathBuf,
    info: CompilerInfo,
    /// Objects compiled or found up to date, in compile order
    objects: Vec<PathBuf>,
}

impl GccToolchain {
    pub fn new(provider: GccProvider, obj_dir: &Path, base_dir: &Path) -> Self {
        GccToolchain {
            provider,
            obj_dir: obj_dir.to_path_buf(),
            base_dir: base_dir.to_path_buf(),
            info: CompilerInfo::new(),
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[PathBuf] {
        &self.objects
    }

    /// Object path for a source file.
    pub fn object_path(&self, source: &Path) -> PathBuf {
        let rel = relative_path(&self.base_dir, source);
        let rel = if rel.components().any(|c| matches!(c, Component::ParentDir)) || rel.is_absolute() {
            // Keep objects for sources outside the package inside obj_dir.
            PathBuf::from(source.file_name().unwrap_or(source.as_os_str()))
        } else {
            rel
        };

        let mut name = rel.into_os_string();
        name.push(".o");
        self.obj_dir.join(name)
    }

    /// Generate the compile command for one source.
    pub fn compile_command(&self, source: &Path, output: &Path, kind: UnitKind) -> CommandSpec {
        let (program, flags, tool_flags) = match kind {
            UnitKind::C => (&self.provider.cc, &self.info.cflags, &self.provider.cflags),
            UnitKind::Asm => (&self.provider.asm, &self.info.aflags, &self.provider.aflags),
        };

        let mut cmd = CommandSpec::new(program).arg("-c");

        for dir in &self.info.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd.args(self.info.define_flags());

        // Compiler package defaults first so package flags override them.
        cmd = cmd.args(tool_flags.iter().cloned());
        cmd = cmd.args(flags.iter().cloned());

        cmd.arg(source.display().to_string())
            .arg("-o")
            .arg(output.display().to_string())
    }

    /// Generate the archive command.
    pub fn archive_command(&self, output: &Path) -> CommandSpec {
        CommandSpec::new(&self.provider.ar)
            .arg("rcs")
            .arg(output.display().to_string())
            .args(self.objects.iter().map(|o| o.display().to_string()))
    }

    /// Generate the link command.
    pub fn link_command(
        &self,
        output: &Path,
        archives: &[PathBuf],
        linker_script: Option<&Path>,
    ) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.provider.cc)
            .arg("-o")
            .arg(output.display().to_string())
            .arg("-Wl,--start-group")
            .args(archives.iter().map(|a| a.display().to_string()))
            .arg("-Wl,--end-group");

        if let Some(script) = linker_script {
            cmd = cmd.arg("-T").arg(script.display().to_string());
        }

        cmd.args(self.provider.lflags.iter().cloned())
            .args(self.info.lflags.iter().cloned())
    }

    fn needs_rebuild(&self, source: &Path, object: &Path, fingerprint: &str) -> bool {
        let Some(obj_time) = mtime(object) else {
            return true;
        };

        let newer = |path: &Path| mtime(path).map(|t| t > obj_time).unwrap_or(true);
        if newer(source) || self.info.extra_deps.iter().any(|dep| newer(dep.as_path())) {
            return true;
        }

        match fs::read_to_string(cmd_path(object)) {
            Ok(stored) => stored.trim() != fingerprint,
            Err(_) => true,
        }
    }

    fn compile_one(&mut self, source: &Path, kind: UnitKind) -> Result<()> {
        let object = self.object_path(source);
        let cmd = self.compile_command(source, &object, kind);
        let fingerprint = command_fingerprint(&cmd);

        if self.needs_rebuild(source, &object, &fingerprint) {
            if let Some(parent) = object.parent() {
                ensure_dir(parent)?;
            }

            tracing::debug!("Compiling {}", relative_path(&self.base_dir, source).display());
            self.run(&cmd)
                .with_context(|| format!("compilation failed for {}", source.display()))?;

            let cmd_file = cmd_path(&object);
            fs::write(&cmd_file, &fingerprint)
                .with_context(|| format!("failed to write {}", cmd_file.display()))?;
        } else {
            tracing::trace!("{} is up to date", object.display());
        }

        self.objects.push(object);
        Ok(())
    }

    fn run(&self, cmd: &CommandSpec) -> Result<()> {
        tracing::debug!("Running: {}", cmd.display());
        ProcessBuilder::new(&cmd.program)
            .args(&cmd.args)
            .cwd(&self.base_dir)
            .timeout(self.provider.timeout)
            .exec_and_check()?;
        Ok(())
    }
}

impl Toolchain for GccToolchain {
    fn add_info(&mut self, info: &CompilerInfo) {
        self.info.merge(info);
    }

    fn add_deps(&mut self, deps: &[PathBuf]) {
        self.info.extra_deps.extend(deps.iter().cloned());
    }

    fn recursive_compile(&mut self, src_root: &Path, kind: UnitKind, ignore: &[&str]) -> Result<()> {
        let sources = walk_files(src_root, ignore, |p| kind.matches(p))?;
        tracing::debug!(
            "Compiling {} {} sources in {}",
            sources.len(),
            kind.as_str(),
            src_root.display()
        );
        for source in &sources {
            self.compile_one(source, kind)?;
        }
        Ok(())
    }

    fn archive(&mut self, output: &Path) -> Result<bool> {
        if self.objects.is_empty() {
            return Ok(false);
        }

        // ar appends to an existing archive; start from scratch.
        if output.exists() {
            fs::remove_file(output)
                .with_context(|| format!("failed to remove {}", output.display()))?;
        }
        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }

        let cmd = self.archive_command(output);
        self.run(&cmd)
            .with_context(|| format!("archiving failed for {}", output.display()))?;
        Ok(true)
    }

    fn link(&mut self, output: &Path, archives: &[PathBuf], linker_script: Option<&Path>) -> Result<()> {
        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }
        let cmd = self.link_command(output, archives, linker_script);
        self.run(&cmd)
            .with_context(|| format!("linking failed for {}", output.display()))
    }
}

fn cmd_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(".");
    name.push(CMD_EXTENSION);
    PathBuf::from(name)
}

fn command_fingerprint(cmd: &CommandSpec) -> String {
    let mut fp = Fingerprint::new();
    fp.update_str(&cmd.program.to_string_lossy());
    fp.update_strs(cmd.args.iter().map(String::as_str));
    fp.finish()
}
