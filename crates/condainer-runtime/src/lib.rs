//! Execution layer for Condainer.
//!
//! Every external tool (installer, package manager, compressor, mount and unmount
//! helpers, network fetch) is described as a [`ToolCommand`] and handed to an
//! [`Executor`]. The executor is the single place where dry-run is decided:
//! [`SystemExecutor`] spawns and waits, [`DryRunExecutor`] only describes, and
//! [`mock::MockExecutor`] records and simulates for tests. Filesystem mutations
//! go through the same capability as [`FsAction`]s. The crate also reads the
//! live mount table and checks that the external tools are installed.

pub mod command;
pub mod executor;
pub mod mock;
pub mod mounts;
pub mod prereq;

pub use command::{compressor_threads, ToolCommand, MAX_COMPRESSOR_THREADS};
pub use executor::{apply_action, DryRunExecutor, Executor, FsAction, SystemExecutor};
pub use mounts::{MountTable, DEFAULT_MOUNT_TABLE};
pub use prereq::{
    check_build_prereqs, check_mount_prereqs, format_missing, tool_report, MissingPrereq,
    ToolStatus,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' failed with exit code {code}")]
    ToolFailed { program: String, code: i32 },
    #[error("cannot read mount table {path}: {source}")]
    MountTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}
