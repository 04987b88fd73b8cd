use crate::project::Project;
use crate::CoreError;
use condainer_runtime::{Executor, FsAction, ToolCommand};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    AlreadyMounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    NotMounted,
}

/// Mount the project image unless it already is. Under a dry-run executor the
/// mount table is still consulted, so the description reflects the real decision.
pub fn mount(project: &Project, executor: &dyn Executor) -> Result<MountOutcome, CoreError> {
    let mount_dir = project.mount_dir();
    if project.is_mounted()? {
        info!("{} already mounted", mount_dir.display());
        return Ok(MountOutcome::AlreadyMounted);
    }

    let image = project.image_path();
    if !image.is_file() {
        return Err(CoreError::ImageNotFound(image));
    }

    executor.apply(&FsAction::CreateDir {
        path: mount_dir.clone(),
        mode: 0o700,
    })?;
    if let Err(e) = executor.run_checked(&ToolCommand::mount_image(&image, &mount_dir)) {
        if let Err(cleanup) = executor.apply(&FsAction::RemoveTree(mount_dir.clone())) {
            warn!("failed to remove mount point {}: {cleanup}", mount_dir.display());
        }
        return Err(e.into());
    }
    info!("mounted {} at {}", image.display(), mount_dir.display());
    Ok(MountOutcome::Mounted)
}

/// Unmount the project image if mounted, then remove the empty mount point so
/// it cannot be mistaken for a later mount.
pub fn umount(project: &Project, executor: &dyn Executor) -> Result<UnmountOutcome, CoreError> {
    let mount_dir = project.mount_dir();
    if !project.is_mounted()? {
        info!("{} not mounted", mount_dir.display());
        return Ok(UnmountOutcome::NotMounted);
    }

    executor.run_checked(&ToolCommand::unmount(&mount_dir))?;
    executor.apply(&FsAction::RemoveTree(mount_dir.clone()))?;
    info!("unmounted {}", mount_dir.display());
    Ok(UnmountOutcome::Unmounted)
}
