use crate::project::Project;
use crate::CoreError;
use serde::Serialize;
use std::path::PathBuf;

/// Resolved paths and live mount state of a project.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProjectStatus {
    pub project_directory: PathBuf,
    pub uuid: String,
    pub image: PathBuf,
    pub image_present: bool,
    pub mount_point: PathBuf,
    pub mounted: bool,
    pub env_name: Option<String>,
    pub lock_file: PathBuf,
}

pub fn status(project: &Project) -> Result<ProjectStatus, CoreError> {
    let image = project.image_path();
    Ok(ProjectStatus {
        project_directory: project.dir().to_path_buf(),
        uuid: project.config().uuid.to_string(),
        image_present: image.is_file(),
        image,
        mount_point: project.mount_dir(),
        mounted: project.is_mounted()?,
        env_name: project.config().user_env_name.clone(),
        lock_file: project.lock_path(),
    })
}
