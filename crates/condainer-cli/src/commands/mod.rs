pub mod build;
pub mod completions;
pub mod exec;
pub mod init;
pub mod man_pages;
pub mod mount;
pub mod prereq;
pub mod status;
pub mod umount;

use condainer_core::Project;
use condainer_runtime::MountTable;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Overrides `/proc/mounts`, mainly for tests.
pub const MOUNT_TABLE_ENV: &str = "CONDAINER_MOUNT_TABLE";

/// Global output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub quiet: bool,
    pub json: bool,
    pub dry_run: bool,
}

impl Output {
    /// Human-readable informational output is wanted.
    pub fn chatty(&self) -> bool {
        !self.quiet && !self.json
    }
}

pub fn open_project(dir: &Path) -> Result<Project, String> {
    let project = Project::open(dir).map_err(|e| e.to_string())?;
    Ok(match std::env::var_os(MOUNT_TABLE_ENV) {
        Some(table) if !table.is_empty() => project.with_mount_table(MountTable::new(table)),
        _ => project,
    })
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Spinner for a short operation, or `None` when output is suppressed.
/// Dry-run prints its own description lines, so it gets no spinner either.
pub fn maybe_spinner(out: &Output, msg: &str) -> Option<ProgressBar> {
    (out.chatty() && !out.dry_run).then(|| spinner(msg))
}

pub fn heading(text: &str) -> String {
    Style::new().bold().apply_to(text).to_string()
}

pub fn enable_hint(cmd: &str) -> String {
    Style::new().bold().cyan().apply_to(cmd).to_string()
}

pub fn disable_hint(cmd: &str) -> String {
    Style::new().bold().red().apply_to(cmd).to_string()
}

/// Print how to use a mounted environment in the current shell.
pub fn print_usage_hint(project: &Project) {
    println!("{}", heading("Environment usage in the present shell"));
    println!(" - enable command  : {}", enable_hint(&project.activation_command()));
    println!(
        " - disable command : {}",
        disable_hint(condainer_schema::deactivation_command(project.config()))
    );
}
