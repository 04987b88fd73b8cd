use crate::project::absolute;
use crate::CoreError;
use condainer_runtime::{Executor, FsAction, ToolCommand};
use condainer_schema::{paths, InitOptions, ProjectConfig, EXAMPLE_ENVIRONMENT_YML};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerSource {
    Downloaded(PathBuf),
    AlreadyPresent(PathBuf),
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub config: ProjectConfig,
    pub installer: InstallerSource,
    pub wrote_example_manifest: bool,
}

/// Create the project skeleton in `project_dir`: descriptor with a fresh UUID,
/// the installer (downloaded when it is a URL), and an example manifest.
pub fn init(
    project_dir: &Path,
    options: &InitOptions,
    executor: &dyn Executor,
) -> Result<InitReport, CoreError> {
    let project_dir = absolute(project_dir)?;
    ProjectConfig::ensure_uninitialized(&project_dir)?;
    let config = ProjectConfig::new(options);

    let installer_path = paths::installer_path(&config, &project_dir);
    if !config.installer_is_remote() && !installer_path.is_file() {
        return Err(CoreError::InstallerNotFound(installer_path));
    }

    executor.apply(&FsAction::WriteFile {
        path: ProjectConfig::path_in(&project_dir),
        contents: config.render()?,
        mode: 0o644,
    })?;
    info!("initialized project {} ({})", project_dir.display(), config.uuid);

    let installer = if !config.installer_is_remote() {
        InstallerSource::Local(installer_path)
    } else if installer_path.is_file() {
        InstallerSource::AlreadyPresent(installer_path)
    } else {
        executor.run_checked(&ToolCommand::fetch_installer(
            &config.installer_url,
            &project_dir,
        ))?;
        InstallerSource::Downloaded(installer_path)
    };

    let manifest = project_dir.join(&config.environment_yml);
    let wrote_example_manifest = !config.non_conda_application && !manifest.exists();
    if wrote_example_manifest {
        executor.apply(&FsAction::WriteFile {
            path: manifest,
            contents: EXAMPLE_ENVIRONMENT_YML.to_owned(),
            mode: 0o644,
        })?;
    }

    Ok(InitReport {
        config,
        installer,
        wrote_example_manifest,
    })
}
