//! Lifecycle orchestration for Condainer projects.
//!
//! This crate ties the schema and runtime layers together: the explicit
//! [`Project`] context, the numbered build pipeline, the idempotent
//! mount/unmount state machine, and the locked mount-run-unmount sequence
//! behind `exec`. Every side effect goes through an injected
//! [`condainer_runtime::Executor`], so dry-run and tests share the live code path.

pub mod concurrency;
pub mod exec;
pub mod init;
pub mod mount;
pub mod pipeline;
pub mod project;
pub mod status;

pub use concurrency::{
    install_signal_handler, release, shutdown_requested, ExecLock, FileLockProvider,
    InMemoryLockProvider, LockHandle, LockProvider,
};
pub use exec::{exec, ExecOutcome};
pub use init::{init, InitReport, InstallerSource};
pub use mount::{mount, umount, MountOutcome, UnmountOutcome};
pub use pipeline::{build, BuildEvent, BuildReport, BuildStep, StepSelection};
pub use project::Project;
pub use status::{status, ProjectStatus};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] condainer_schema::ConfigError),
    #[error("runtime error: {0}")]
    Runtime(#[from] condainer_runtime::RuntimeError),
    #[error("found existing image file {0}, please remove it first")]
    ImageAlreadyExists(PathBuf),
    #[error("mount point {0} is in use, please unmount first")]
    MountPointBusy(PathBuf),
    #[error("only one instance of `condainer exec` can run at the same time (lock {0} is held)")]
    ExecAlreadyRunning(PathBuf),
    #[error("image file {0} not found, run `condainer build` first")]
    ImageNotFound(PathBuf),
    #[error("installer {0} not found")]
    InstallerNotFound(PathBuf),
    #[error("unknown build step '{0}', expected numbers 1-7")]
    UnknownStep(String),
    #[error("no command given")]
    EmptyCommand,
    #[error("interrupted")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
