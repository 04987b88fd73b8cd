use crate::command::ToolCommand;
use crate::RuntimeError;
use std::fmt;
use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

/// A filesystem mutation performed on behalf of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsAction {
    CreateDir { path: PathBuf, mode: u32 },
    RemoveTree(PathBuf),
    RemoveFile(PathBuf),
    WriteFile {
        path: PathBuf,
        contents: String,
        mode: u32,
    },
    /// Recursively drop (`a-w`) or restore (`u+w`) write permission.
    SetWritable { path: PathBuf, writable: bool },
}

impl fmt::Display for FsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsAction::CreateDir { path, mode } => {
                write!(f, "mkdir -p -m {mode:o} {}", path.display())
            }
            FsAction::RemoveTree(path) => write!(f, "rm -rf {}", path.display()),
            FsAction::RemoveFile(path) => write!(f, "rm -f {}", path.display()),
            FsAction::WriteFile { path, mode, .. } => {
                write!(f, "write {} (mode {mode:o})", path.display())
            }
            FsAction::SetWritable { path, writable } => {
                let op = if *writable { "u+w" } else { "a-w" };
                write!(f, "chmod -R {op} {}", path.display())
            }
        }
    }
}

/// The capability through which every side effect of the core flows.
pub trait Executor: Send + Sync {
    /// Run `cmd` to completion and return its exit code. Death by signal
    /// maps to `128 + signal`, as a shell reports it.
    fn run(&self, cmd: &ToolCommand) -> Result<i32, RuntimeError>;

    fn apply(&self, action: &FsAction) -> Result<(), RuntimeError>;

    /// True when nothing is actually executed or mutated.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Run `cmd` and turn a non-zero exit code into [`RuntimeError::ToolFailed`].
    fn run_checked(&self, cmd: &ToolCommand) -> Result<(), RuntimeError> {
        match self.run(cmd)? {
            0 => Ok(()),
            code => Err(RuntimeError::ToolFailed {
                program: cmd.program_name(),
                code,
            }),
        }
    }
}

/// Spawns real processes and mutates the real filesystem.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SystemExecutor {
    fn run(&self, cmd: &ToolCommand) -> Result<i32, RuntimeError> {
        debug!("exec: {cmd}");
        let status = cmd.to_std().status().map_err(|source| RuntimeError::Spawn {
            program: cmd.program_name(),
            source,
        })?;
        let code = status
            .code()
            .or_else(|| status.signal().map(|s| 128 + s))
            .unwrap_or(1);
        debug!("{} exited with {code}", cmd.program_name());
        Ok(code)
    }

    fn apply(&self, action: &FsAction) -> Result<(), RuntimeError> {
        debug!("fs: {action}");
        apply_action(action)
    }
}

/// Describes every command and mutation instead of performing it.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    quiet: bool,
    log: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Everything that would have been done, in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn describe(&self, line: String) {
        if !self.quiet {
            println!("[dry-run] {line}");
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(line);
        }
    }
}

impl Executor for DryRunExecutor {
    fn run(&self, cmd: &ToolCommand) -> Result<i32, RuntimeError> {
        self.describe(cmd.to_string());
        Ok(0)
    }

    fn apply(&self, action: &FsAction) -> Result<(), RuntimeError> {
        self.describe(action.to_string());
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Perform `action` on the real filesystem.
pub fn apply_action(action: &FsAction) -> Result<(), RuntimeError> {
    match action {
        FsAction::CreateDir { path, mode } => {
            if !path.is_dir() {
                fs::DirBuilder::new()
                    .recursive(true)
                    .mode(*mode)
                    .create(path)?;
            }
        }
        FsAction::RemoveTree(path) => match fs::remove_dir_all(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
        FsAction::RemoveFile(path) => match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
        FsAction::WriteFile {
            path,
            contents,
            mode,
        } => condainer_schema::write_atomic(path, contents, Some(*mode))?,
        FsAction::SetWritable { path, writable } => {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry.map_err(|e| RuntimeError::Walk {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                if entry.path_is_symlink() {
                    continue;
                }
                let meta = entry.metadata().map_err(|e| RuntimeError::Walk {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                })?;
                let current = meta.permissions().mode();
                let next = if *writable {
                    current | 0o200
                } else {
                    current & !0o222
                };
                if next != current {
                    fs::set_permissions(entry.path(), fs::Permissions::from_mode(next))?;
                }
            }
        }
    }
    Ok(())
}
