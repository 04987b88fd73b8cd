//! Scripted executor for tests.
//!
//! Records every command, applies filesystem actions for real, and simulates
//! what each external tool would leave behind so the lifecycle code can be
//! exercised end to end without conda, squashfs, or FUSE on the host.

use crate::command::ToolCommand;
use crate::executor::{apply_action, Executor, FsAction};
use crate::RuntimeError;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: Mutex<Vec<ToolCommand>>,
    failures: Mutex<HashMap<String, i32>>,
    exit_codes: Mutex<HashMap<String, i32>>,
    mount_table: Option<PathBuf>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount and unmount edit this synthetic mount table.
    #[must_use]
    pub fn with_mount_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_table = Some(path.into());
        self
    }

    /// Make every later invocation of `program` exit with `code` and no effect.
    pub fn fail_program(&self, program: &str, code: i32) {
        if let Ok(mut f) = self.failures.lock() {
            f.insert(program.to_owned(), code);
        }
    }

    /// Let `program` run its simulated effect but exit with `code`.
    pub fn set_exit_code(&self, program: &str, code: i32) {
        if let Ok(mut c) = self.exit_codes.lock() {
            c.insert(program.to_owned(), code);
        }
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Program names of every recorded call, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(ToolCommand::program_name).collect()
    }

    pub fn invoked(&self, program: &str) -> bool {
        self.programs().iter().any(|p| p == program)
    }

    fn simulate(&self, cmd: &ToolCommand) -> Result<(), RuntimeError> {
        let args: Vec<&OsString> = cmd.args.iter().collect();
        match cmd.program_name().as_str() {
            "bash" => {
                if let Some(prefix) = arg_after(&args, "-p") {
                    let bin = prefix.join("bin");
                    fs::create_dir_all(&bin)?;
                    fs::write(bin.join("activate"), "# mock activate\n")?;
                    fs::create_dir_all(prefix.join("pkgs"))?;
                }
            }
            "curl" => {
                if let (Some(url), Some(dir)) = (args.last(), cmd.cwd.as_ref()) {
                    let url = url.to_string_lossy();
                    let name = url.rsplit('/').next().unwrap_or("installer.sh");
                    fs::write(dir.join(name), "#!/bin/sh\n")?;
                }
            }
            "mksquashfs" => {
                if let Some(image) = args.get(1) {
                    fs::write(image, b"hsqs-mock")?;
                }
            }
            "squashfuse" => {
                if let (Some(table), Some(dir)) = (&self.mount_table, args.get(1)) {
                    let mut f = fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(table)?;
                    writeln!(
                        f,
                        "squashfuse {} fuse.squashfuse ro,nosuid,nodev 0 0",
                        Path::new(dir).display()
                    )?;
                }
            }
            "fusermount" => {
                if let (Some(table), Some(dir)) = (&self.mount_table, args.get(1)) {
                    let wanted = dir.as_bytes();
                    let content = fs::read(table)?;
                    let kept: Vec<&[u8]> = content
                        .split(|&b| b == b'\n')
                        .filter(|line| {
                            !line.is_empty()
                                && line
                                    .split(u8::is_ascii_whitespace)
                                    .filter(|f| !f.is_empty())
                                    .nth(1)
                                    != Some(wanted)
                        })
                        .collect();
                    let mut out = kept.join(&b'\n');
                    if !out.is_empty() {
                        out.push(b'\n');
                    }
                    fs::write(table, out)?;
                }
            }
            _ => {
                // Package manager: `<prefix>/bin/<exe> env create ... --name <env>`
                if args.first().is_some_and(|a| *a == "env") {
                    if let (Some(name), Some(prefix)) = (
                        arg_after(&args, "--name"),
                        Path::new(&cmd.program).parent().and_then(Path::parent),
                    ) {
                        fs::create_dir_all(prefix.join("envs").join(name).join("bin"))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn arg_after(args: &[&OsString], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

impl Executor for MockExecutor {
    fn run(&self, cmd: &ToolCommand) -> Result<i32, RuntimeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }
        let name = cmd.program_name();
        if let Some(code) = self.failures.lock().ok().and_then(|f| f.get(&name).copied()) {
            return Ok(code);
        }
        self.simulate(cmd)?;
        Ok(self
            .exit_codes
            .lock()
            .ok()
            .and_then(|c| c.get(&name).copied())
            .unwrap_or(0))
    }

    fn apply(&self, action: &FsAction) -> Result<(), RuntimeError> {
        apply_action(action)
    }
}
