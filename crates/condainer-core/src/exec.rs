use crate::concurrency::LockProvider;
use crate::mount::{mount, umount, MountOutcome};
use crate::project::Project;
use crate::CoreError;
use condainer_runtime::{Executor, ToolCommand};
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Exit code of the user command.
    pub exit_code: i32,
    /// Whether this invocation mounted (and therefore unmounted) the image.
    pub mounted_here: bool,
}

/// Run `command` inside the project environment.
///
/// Only one `exec` per (project, host) runs at a time; a second one fails
/// immediately with [`CoreError::ExecAlreadyRunning`]. The image is mounted
/// on demand and unmounted afterwards only if this call mounted it. The lock
/// is released on every exit path.
pub fn exec(
    project: &Project,
    executor: &dyn Executor,
    locks: &dyn LockProvider,
    command: &[String],
    working_dir: Option<&Path>,
) -> Result<ExecOutcome, CoreError> {
    if command.is_empty() {
        return Err(CoreError::EmptyCommand);
    }

    let lock_path = project.lock_path();
    let Some(lock) = locks.try_acquire(&lock_path)? else {
        info!("exec lock {} is held elsewhere", lock_path.display());
        return Err(CoreError::ExecAlreadyRunning(lock_path));
    };

    let result = run_locked(project, executor, command, working_dir);
    let released = lock.release();
    let outcome = result?;
    released?;
    Ok(outcome)
}

fn run_locked(
    project: &Project,
    executor: &dyn Executor,
    command: &[String],
    working_dir: Option<&Path>,
) -> Result<ExecOutcome, CoreError> {
    // Another process may mount between the two table reads; only a mount
    // performed here is undone here.
    let mounted_here =
        !project.is_mounted()? && mount(project, executor)? == MountOutcome::Mounted;

    let ran = executor.run(&user_command(project, command, working_dir));

    let unmounted = if mounted_here {
        umount(project, executor).map(|_| ())
    } else {
        Ok(())
    };

    let exit_code = match (ran, unmounted) {
        (Ok(code), Ok(())) => code,
        (Err(e), unmounted) => {
            if let Err(u) = unmounted {
                warn!("unmount after failed command also failed: {u}");
            }
            return Err(e.into());
        }
        (Ok(_), Err(u)) => return Err(u),
    };
    debug!("{} exited with {exit_code}", command[0]);
    Ok(ExecOutcome {
        exit_code,
        mounted_here,
    })
}

fn user_command(project: &Project, command: &[String], working_dir: Option<&Path>) -> ToolCommand {
    let mut path = project.env_bin_dir().into_os_string();
    if let Some(existing) = std::env::var_os("PATH").filter(|p| !p.is_empty()) {
        path.push(":");
        path.push(existing);
    }
    let mut cmd = ToolCommand::new(OsString::from(&command[0]))
        .args(&command[1..])
        .env("PATH", path);
    if let Some(dir) = working_dir {
        cmd = cmd.current_dir(dir);
    }
    cmd
}
