//! Project descriptor, environment manifest inspection, and path resolution for Condainer.
//!
//! This crate defines the schema layer: the YAML project descriptor
//! (`ProjectConfig`, persisted as `condainer.yml`), the few facts read from the
//! user's environment manifest, and the pure path resolver deriving the mount
//! directory, image file, lock file, and activation command from a configuration.

pub mod config;
pub mod environment;
pub mod paths;

pub use config::{write_atomic, InitOptions, ProjectConfig, CONFIG_FILE, DEFAULT_INSTALLER_URL};
pub use environment::{resolve_env_name, DEFAULT_ENV_NAME, EXAMPLE_ENVIRONMENT_YML};
pub use paths::{
    activation_command, deactivation_command, env_bin_directory, image_file_name,
    installer_path, lock_file_name, mount_directory, shell_quote, HostContext,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project configuration at {0} (run `condainer init` first)")]
    Missing(PathBuf),
    #[error("failed to parse {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("found existing {0}, please run `init` from an empty directory")]
    AlreadyInitialized(PathBuf),
    #[error("invalid project configuration: {0}")]
    Invalid(String),
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
}
