use crate::CoreError;
use condainer_runtime::MountTable;
use condainer_schema::{paths, HostContext, ProjectConfig};
use std::path::{Path, PathBuf};

/// Explicit context for one project directory.
///
/// Operations never depend on the process working directory; everything they
/// touch is derived from this value, so several projects can be driven from a
/// single process.
#[derive(Debug, Clone)]
pub struct Project {
    dir: PathBuf,
    config: ProjectConfig,
    host: HostContext,
    mount_table: MountTable,
}

impl Project {
    /// Load the project in `dir` against the live host and mount table.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let dir = absolute(dir.as_ref())?;
        let config = ProjectConfig::load(&dir)?;
        Ok(Self::from_parts(
            dir,
            config,
            HostContext::detect(),
            MountTable::default(),
        ))
    }

    pub fn from_parts(
        dir: PathBuf,
        config: ProjectConfig,
        host: HostContext,
        mount_table: MountTable,
    ) -> Self {
        Self {
            dir,
            config,
            host,
            mount_table,
        }
    }

    #[must_use]
    pub fn with_mount_table(mut self, mount_table: MountTable) -> Self {
        self.mount_table = mount_table;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: HostContext) -> Self {
        self.host = host;
        self
    }

    /// Re-read the descriptor; another process may have rewritten it.
    pub fn reload(&mut self) -> Result<(), CoreError> {
        self.config = ProjectConfig::load(&self.dir)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut ProjectConfig {
        &mut self.config
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn mount_table(&self) -> &MountTable {
        &self.mount_table
    }

    pub fn config_path(&self) -> PathBuf {
        ProjectConfig::path_in(&self.dir)
    }

    pub fn mount_dir(&self) -> PathBuf {
        paths::mount_directory(&self.config, &self.host)
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join(paths::image_file_name(&self.config))
    }

    pub fn lock_path(&self) -> PathBuf {
        paths::lock_file_name(&self.config, &self.host)
    }

    pub fn activation_command(&self) -> String {
        paths::activation_command(&self.config, &self.host)
    }

    pub fn env_bin_dir(&self) -> PathBuf {
        paths::env_bin_directory(&self.config, &self.host)
    }

    pub fn installer_path(&self) -> PathBuf {
        paths::installer_path(&self.config, &self.dir)
    }

    /// Resolve a path from the descriptor against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.dir.join(path)
    }

    /// Always queries the mount table; never cached.
    pub fn is_mounted(&self) -> Result<bool, CoreError> {
        Ok(self.mount_table.is_mounted(&self.mount_dir())?)
    }
}

pub(crate) fn absolute(dir: &Path) -> Result<PathBuf, CoreError> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condainer_schema::InitOptions;

    #[test]
    fn open_loads_descriptor_and_derives_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ProjectConfig::initialize(dir.path(), &InitOptions::default()).unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.config(), &cfg);
        assert_eq!(
            project.image_path(),
            dir.path().join(format!("{}.squashfs", cfg.uuid))
        );
        assert_eq!(
            project.mount_dir(),
            PathBuf::from(format!("/tmp/condainer-{}", cfg.uuid))
        );
    }

    #[test]
    fn open_without_descriptor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Project::open(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(condainer_schema::ConfigError::Missing(_))
        ));
    }

    #[test]
    fn two_projects_in_one_process_stay_apart() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        ProjectConfig::initialize(a.path(), &InitOptions::default()).unwrap();
        ProjectConfig::initialize(b.path(), &InitOptions::default()).unwrap();
        let pa = Project::open(a.path()).unwrap();
        let pb = Project::open(b.path()).unwrap();
        assert_ne!(pa.mount_dir(), pb.mount_dir());
        assert_ne!(pa.lock_path(), pb.lock_path());
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ProjectConfig::initialize(dir.path(), &InitOptions::default()).unwrap();
        let mut project = Project::open(dir.path()).unwrap();
        cfg.user_env_name = Some("edited".to_owned());
        cfg.save(dir.path()).unwrap();
        project.reload().unwrap();
        assert_eq!(project.config().user_env_name.as_deref(), Some("edited"));
    }
}
