use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Name of the project descriptor inside the project directory.
pub const CONFIG_FILE: &str = "condainer.yml";

pub const DEFAULT_INSTALLER_URL: &str =
    "https://github.com/conda-forge/miniforge/releases/latest/download/Miniforge3-Linux-x86_64.sh";
const DEFAULT_ENVIRONMENT_YML: &str = "environment.yml";
const DEFAULT_REQUIREMENTS_TXT: &str = "requirements.txt";
const DEFAULT_CONDA_EXE: &str = "mamba";
const DEFAULT_MOUNT_BASE: &str = "/tmp";

const HEADER: &str = "\
# Condainer project configuration file
#
# - initially created by `condainer init`
# - can be edited by hand, if necessary
#
";

/// The durable project descriptor. Every operation re-reads it from disk;
/// it is never shared in memory across invocations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub environment_yml: PathBuf,
    #[serde(default)]
    pub requirements_txt: Option<PathBuf>,
    pub installer_url: String,
    pub conda_exe: String,
    pub mount_base_directory: PathBuf,
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_env_name: Option<String>,
    #[serde(default)]
    pub multiuser_mountpoint: bool,
    #[serde(default)]
    pub non_conda_application: bool,
}

/// Caller-controlled knobs for `init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overrides the default installer locator (URL or local path).
    pub installer_url: Option<String>,
    pub non_conda_application: bool,
    pub multiuser_mountpoint: bool,
}

impl ProjectConfig {
    /// Build a fresh configuration with a new UUID and the default locations.
    pub fn new(options: &InitOptions) -> Self {
        Self {
            environment_yml: PathBuf::from(DEFAULT_ENVIRONMENT_YML),
            requirements_txt: Some(PathBuf::from(DEFAULT_REQUIREMENTS_TXT)),
            installer_url: options
                .installer_url
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTALLER_URL.to_owned()),
            conda_exe: DEFAULT_CONDA_EXE.to_owned(),
            mount_base_directory: PathBuf::from(DEFAULT_MOUNT_BASE),
            uuid: Uuid::new_v4(),
            user_env_name: None,
            multiuser_mountpoint: options.multiuser_mountpoint,
            non_conda_application: options.non_conda_application,
        }
    }

    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE)
    }

    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(project_dir);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let cfg: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Corrupt {
                path: path.clone(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Render the descriptor as it is stored on disk, comment header included.
    pub fn render(&self) -> Result<String, ConfigError> {
        let body = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
        Ok(format!("{HEADER}{body}"))
    }

    /// Overwrite the descriptor. Readers never observe a partially written file.
    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let content = self.render()?;
        write_atomic(&Self::path_in(project_dir), &content, Some(0o644))?;
        Ok(())
    }

    pub fn ensure_uninitialized(project_dir: &Path) -> Result<(), ConfigError> {
        let path = Self::path_in(project_dir);
        if path.exists() {
            return Err(ConfigError::AlreadyInitialized(path));
        }
        Ok(())
    }

    pub fn initialize(project_dir: &Path, options: &InitOptions) -> Result<Self, ConfigError> {
        Self::ensure_uninitialized(project_dir)?;
        let cfg = Self::new(options);
        cfg.save(project_dir)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uuid.is_nil() {
            return Err(ConfigError::Invalid("uuid must not be nil".to_owned()));
        }
        if self.mount_base_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "mount_base_directory must not be empty".to_owned(),
            ));
        }
        if !self.non_conda_application && self.conda_exe.trim().is_empty() {
            return Err(ConfigError::Invalid("conda_exe must not be empty".to_owned()));
        }
        if self.installer_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "installer_url must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Whether the installer has to be fetched from the network first.
    pub fn installer_is_remote(&self) -> bool {
        self.installer_url.starts_with("http")
    }
}

/// Write `content` to `dest` through a temp file in the same directory and a rename.
pub fn write_atomic(dest: &Path, content: &str, mode: Option<u32>) -> std::io::Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Some(mode) = mode {
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))?;
    }
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
