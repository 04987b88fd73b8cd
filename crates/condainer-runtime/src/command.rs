use condainer_schema::shell_quote;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Upper bound on compressor worker threads, whatever the host core count.
/// Build hosts are frequently shared login nodes.
pub const MAX_COMPRESSOR_THREADS: usize = 8;

pub fn compressor_threads() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .min(MAX_COMPRESSOR_THREADS)
}

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub env_remove: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// File name of the program, used for matching in logs and tests.
    pub fn program_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Download the installer into `project_dir`, keeping the remote file name.
    pub fn fetch_installer(url: &str, project_dir: &Path) -> Self {
        Self::new("curl").arg("-JLO").arg(url).current_dir(project_dir)
    }

    /// Install the base runtime into `prefix`. A user `PYTHONPATH` would leak
    /// into the installer's own Python and is stripped.
    pub fn install_base(installer: &Path, prefix: &Path) -> Self {
        Self::new("bash")
            .arg(installer)
            .args(["-b", "-f", "-p"])
            .arg(prefix)
            .env_remove("PYTHONPATH")
    }

    pub fn create_env(conda_exe: &Path, manifest: &Path, env_name: &str) -> Self {
        Self::new(conda_exe)
            .args(["env", "create", "--file"])
            .arg(manifest)
            .args(["--name", env_name])
    }

    pub fn pip_install(pip: &Path, requirements: &Path) -> Self {
        Self::new(pip).args(["install", "--requirement"]).arg(requirements)
    }

    pub fn clean_cache(conda_exe: &Path) -> Self {
        Self::new(conda_exe).args(["clean", "--all", "--yes"])
    }

    pub fn compress(source: &Path, image: &Path, threads: usize) -> Self {
        // Trailing slash: pack the directory's contents, not the directory.
        let mut src = source.as_os_str().to_owned();
        src.push("/");
        Self::new("mksquashfs")
            .arg(src)
            .arg(image)
            .arg("-noappend")
            .arg("-processors")
            .arg(threads.to_string())
    }

    pub fn mount_image(image: &Path, mount_dir: &Path) -> Self {
        Self::new("squashfuse").arg(image).arg(mount_dir)
    }

    pub fn unmount(mount_dir: &Path) -> Self {
        Self::new("fusermount").arg("-u").arg(mount_dir)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.cwd {
            write!(f, "(cd {} && ", shell_quote(&dir.to_string_lossy()))?;
        }
        for key in &self.env_remove {
            write!(f, "env -u {} ", key.to_string_lossy())?;
        }
        for (key, value) in &self.env {
            write!(
                f,
                "{}={} ",
                key.to_string_lossy(),
                shell_quote(&value.to_string_lossy())
            )?;
        }
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(&arg.to_string_lossy()))?;
        }
        if self.cwd.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}
