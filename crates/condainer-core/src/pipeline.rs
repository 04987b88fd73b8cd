//! The numbered build pipeline.
//!
//! Steps run in ascending order and each can be selected on its own. A failing
//! step aborts the rest, but the staging directory is removed on every failure
//! path unless the executor is a dry run.

use crate::concurrency::shutdown_requested;
use crate::project::Project;
use crate::CoreError;
use condainer_runtime::{compressor_threads, Executor, FsAction, ToolCommand};
use condainer_schema::{paths, resolve_env_name};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildStep {
    BaseRuntime = 1,
    UserEnvironment = 2,
    Requirements = 3,
    CleanCache = 4,
    Compress = 5,
    Scripts = 6,
    Cleanup = 7,
}

impl BuildStep {
    pub const ALL: [BuildStep; 7] = [
        BuildStep::BaseRuntime,
        BuildStep::UserEnvironment,
        BuildStep::Requirements,
        BuildStep::CleanCache,
        BuildStep::Compress,
        BuildStep::Scripts,
        BuildStep::Cleanup,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == n)
    }

    pub fn description(self) -> &'static str {
        match self {
            BuildStep::BaseRuntime => "install base runtime",
            BuildStep::UserEnvironment => "create user environment",
            BuildStep::Requirements => "install additional requirements",
            BuildStep::CleanCache => "clean package caches",
            BuildStep::Compress => "compress image",
            BuildStep::Scripts => "write activate/deactivate scripts",
            BuildStep::Cleanup => "remove staging directory",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.description())
    }
}

/// Which steps a build runs. Unknown step numbers are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSelection(BTreeSet<BuildStep>);

impl Default for StepSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl StepSelection {
    pub fn all() -> Self {
        Self(BuildStep::ALL.into_iter().collect())
    }

    pub fn only(steps: impl IntoIterator<Item = BuildStep>) -> Self {
        Self(steps.into_iter().collect())
    }

    pub fn contains(&self, step: BuildStep) -> bool {
        self.0.contains(&step)
    }

    pub fn iter(&self) -> impl Iterator<Item = BuildStep> + '_ {
        self.0.iter().copied()
    }
}

impl FromStr for StepSelection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = BTreeSet::new();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let step = token
                .parse::<u8>()
                .ok()
                .and_then(BuildStep::from_number)
                .ok_or_else(|| CoreError::UnknownStep(token.to_owned()))?;
            steps.insert(step);
        }
        if steps.is_empty() {
            return Err(CoreError::UnknownStep(s.to_owned()));
        }
        Ok(Self(steps))
    }
}

/// Progress notifications for the caller's UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Started(BuildStep),
    Finished(BuildStep),
    Skipped { step: BuildStep, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub completed: Vec<BuildStep>,
    pub skipped: Vec<(BuildStep, String)>,
    pub image: PathBuf,
    pub env_name: Option<String>,
}

enum StepResult {
    Done,
    Skipped(String),
}

/// Run the selected build steps for `project`.
pub fn build(
    project: &mut Project,
    executor: &dyn Executor,
    steps: &StepSelection,
    observer: &dyn Fn(&BuildEvent),
) -> Result<BuildReport, CoreError> {
    let image = project.image_path();
    let stage = project.mount_dir();

    if image.exists() {
        return Err(CoreError::ImageAlreadyExists(image));
    }
    if project.is_mounted()? {
        return Err(CoreError::MountPointBusy(stage));
    }

    let mut report = BuildReport {
        image,
        ..BuildReport::default()
    };

    let outcome = executor
        .apply(&FsAction::CreateDir {
            path: stage.clone(),
            mode: 0o700,
        })
        .map_err(CoreError::from)
        .and_then(|()| run_steps(project, executor, steps, observer, &mut report));

    match outcome {
        Ok(()) => {
            report.env_name.clone_from(&project.config().user_env_name);
            info!("build finished: {}", report.image.display());
            Ok(report)
        }
        Err(e) => {
            warn!("build aborted: {e}");
            if let Err(cleanup) = executor.apply(&FsAction::RemoveTree(stage.clone())) {
                warn!("failed to remove staging directory {}: {cleanup}", stage.display());
            }
            Err(e)
        }
    }
}

fn run_steps(
    project: &mut Project,
    executor: &dyn Executor,
    steps: &StepSelection,
    observer: &dyn Fn(&BuildEvent),
    report: &mut BuildReport,
) -> Result<(), CoreError> {
    for step in steps.iter() {
        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }
        debug!("starting {step}");
        observer(&BuildEvent::Started(step));
        match run_step(step, project, executor)? {
            StepResult::Done => {
                observer(&BuildEvent::Finished(step));
                report.completed.push(step);
            }
            StepResult::Skipped(reason) => {
                info!("skipping {step}: {reason}");
                observer(&BuildEvent::Skipped {
                    step,
                    reason: reason.clone(),
                });
                report.skipped.push((step, reason));
            }
        }
    }
    Ok(())
}

fn run_step(
    step: BuildStep,
    project: &mut Project,
    executor: &dyn Executor,
) -> Result<StepResult, CoreError> {
    let stage = project.mount_dir();
    let non_conda = project.config().non_conda_application;
    if non_conda
        && matches!(
            step,
            BuildStep::UserEnvironment | BuildStep::Requirements | BuildStep::CleanCache
        )
    {
        return Ok(StepResult::Skipped("non-conda application".to_owned()));
    }

    match step {
        BuildStep::BaseRuntime => {
            let installer = project.installer_path();
            if !installer.is_file() {
                return Err(CoreError::InstallerNotFound(installer));
            }
            executor.run_checked(&ToolCommand::install_base(&installer, &stage))?;
        }
        BuildStep::UserEnvironment => {
            let manifest = project.resolve(&project.config().environment_yml);
            let env_name = resolve_env_name(&manifest)?;
            let conda = stage.join("bin").join(&project.config().conda_exe);
            executor.run_checked(&ToolCommand::create_env(&conda, &manifest, &env_name))?;

            // Persist right away: later steps and later mounts need the name
            // even if the build fails further down.
            project.config_mut().user_env_name = Some(env_name);
            executor.apply(&FsAction::WriteFile {
                path: project.config_path(),
                contents: project.config().render()?,
                mode: 0o644,
            })?;
        }
        BuildStep::Requirements => {
            let Some(requirements) = project.config().requirements_txt.clone() else {
                return Ok(StepResult::Skipped(
                    "no requirements file configured".to_owned(),
                ));
            };
            let requirements = project.resolve(&requirements);
            if !requirements.is_file() {
                return Ok(StepResult::Skipped(format!(
                    "{} not found",
                    requirements.display()
                )));
            }
            if project.config().user_env_name.is_none() {
                let manifest = project.resolve(&project.config().environment_yml);
                project.config_mut().user_env_name = Some(resolve_env_name(&manifest)?);
            }
            let pip = paths::env_bin_directory(project.config(), project.host()).join("pip");
            executor.run_checked(&ToolCommand::pip_install(&pip, &requirements))?;
        }
        BuildStep::CleanCache => {
            let conda = stage.join("bin").join(&project.config().conda_exe);
            executor.run_checked(&ToolCommand::clean_cache(&conda))?;
        }
        BuildStep::Compress => compress(project, executor, &stage)?,
        BuildStep::Scripts => write_scripts(project, executor)?,
        BuildStep::Cleanup => {
            executor.apply(&FsAction::RemoveTree(stage))?;
        }
    }
    Ok(StepResult::Done)
}

fn compress(
    project: &Project,
    executor: &dyn Executor,
    stage: &Path,
) -> Result<(), CoreError> {
    let image = project.image_path();
    let threads = compressor_threads();
    debug!("compressing with {threads} threads");

    executor.apply(&FsAction::SetWritable {
        path: stage.to_path_buf(),
        writable: false,
    })?;
    let packed = executor.run_checked(&ToolCommand::compress(stage, &image, threads));
    // Restore write permission before anything else, or the staging tree
    // cannot be deleted.
    executor.apply(&FsAction::SetWritable {
        path: stage.to_path_buf(),
        writable: true,
    })?;
    if let Err(e) = packed {
        executor.apply(&FsAction::RemoveFile(image))?;
        return Err(e.into());
    }
    Ok(())
}

fn write_scripts(project: &Project, executor: &dyn Executor) -> Result<(), CoreError> {
    let activate = format!(
        "# usage: source activate\n\
         condainer --quiet --directory {} mount\n\
         {}\n",
        paths::shell_quote(&project.dir().to_string_lossy()),
        project.activation_command()
    );
    let deactivate = format!(
        "# usage: source deactivate\n\
         {}\n\
         echo \"Hint: Run  condainer umount  now in case the environment is not activated in any other shell.\"\n",
        paths::deactivation_command(project.config())
    );
    executor.apply(&FsAction::WriteFile {
        path: project.dir().join("activate"),
        contents: activate,
        mode: 0o755,
    })?;
    executor.apply(&FsAction::WriteFile {
        path: project.dir().join("deactivate"),
        contents: deactivate,
        mode: 0o755,
    })?;
    Ok(())
}
