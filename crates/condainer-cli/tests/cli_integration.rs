//! CLI subprocess integration tests.
//!
//! These tests invoke the `condainer` binary as a subprocess against a
//! temporary project. External tools are never required: builds run in
//! dry-run mode and the mount table is a fixture file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    /// `init` with a local installer and a mount base inside the temp dir.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let installer = dir.path().join("Miniforge3.sh");
        std::fs::write(&installer, "#!/bin/sh\n").unwrap();

        let output = condainer(dir.path())
            .env("CONDAINER_INSTALLER", &installer)
            .args(["--quiet", "init"])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "init must exit 0. stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let cfg_path = dir.path().join("condainer.yml");
        let cfg = std::fs::read_to_string(&cfg_path).unwrap();
        let mnt = dir.path().join("mnt");
        let cfg = cfg.replace(
            "mount_base_directory: /tmp",
            &format!("mount_base_directory: {}", mnt.display()),
        );
        std::fs::write(&cfg_path, cfg).unwrap();
        std::fs::write(dir.path().join("mounts"), "proc /proc proc rw 0 0\n").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = condainer(self.path());
        cmd.env("CONDAINER_MOUNT_TABLE", self.path().join("mounts"));
        cmd
    }

    fn status_json(&self) -> serde_json::Value {
        let output = self.cmd().args(["--json", "status"]).output().unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn mount_point(&self) -> PathBuf {
        PathBuf::from(self.status_json()["mount_point"].as_str().unwrap())
    }

    fn mark_mounted(&self) {
        std::fs::write(
            self.path().join("mounts"),
            format!(
                "squashfuse {} fuse.squashfuse ro,nosuid,nodev 0 0\n",
                self.mount_point().display()
            ),
        )
        .unwrap();
    }

    fn listing(&self) -> BTreeSet<PathBuf> {
        std::fs::read_dir(self.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn condainer(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_condainer"));
    cmd.arg("--directory").arg(dir);
    cmd.env("CONDAINER_SKIP_PREREQS", "1");
    cmd.env_remove("CONDAINER_LOG");
    cmd
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_condainer"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("condainer"));
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_condainer"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["init", "build", "mount", "umount", "exec", "status", "prereq"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn init_writes_descriptor_and_example_manifest() {
    let project = TestProject::new();
    let cfg = std::fs::read_to_string(project.path().join("condainer.yml")).unwrap();
    assert!(cfg.contains("uuid:"));
    assert!(cfg.contains("Miniforge3.sh"));
    assert!(project.path().join("environment.yml").is_file());
}

#[test]
fn init_twice_fails() {
    let project = TestProject::new();
    let output = project
        .cmd()
        .env("CONDAINER_INSTALLER", project.path().join("Miniforge3.sh"))
        .arg("init")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("found existing"));
}

#[test]
fn init_with_missing_local_installer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = condainer(dir.path())
        .env("CONDAINER_INSTALLER", "/nonexistent/Miniforge3.sh")
        .arg("init")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("condainer.yml").exists());
}

#[test]
fn commands_outside_a_project_fail() {
    let dir = tempfile::tempdir().unwrap();
    let output = condainer(dir.path()).arg("status").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("condainer init"));
}

#[test]
fn status_reports_mount_state() {
    let project = TestProject::new();
    let output = project.cmd().arg("status").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("image mounted: false"));

    project.mark_mounted();
    let output = project.cmd().arg("status").output().unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains("image mounted: true"));
}

#[test]
fn status_json_is_stable() {
    let project = TestProject::new();
    let json = project.status_json();
    let uuid = json["uuid"].as_str().unwrap();
    assert_eq!(json["mounted"], false);
    assert_eq!(json["image_present"], false);
    assert!(json["image"].as_str().unwrap().ends_with(&format!("{uuid}.squashfs")));
    assert!(json["mount_point"]
        .as_str()
        .unwrap()
        .ends_with(&format!("mnt/condainer-{uuid}")));
    assert!(json["lock_file"].as_str().unwrap().ends_with(".mutex"));
}

#[test]
fn dry_run_build_changes_nothing() {
    let project = TestProject::new();
    let before = project.listing();

    let output = project.cmd().args(["--dry-run", "build"]).output().unwrap();

    assert!(
        output.status.success(),
        "dry-run build must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[dry-run] "));
    assert!(stdout.contains("mksquashfs"));
    assert_eq!(project.listing(), before);
    assert!(!project.path().join("mnt").exists());
}

#[test]
fn build_rejects_unknown_steps() {
    let project = TestProject::new();
    let output = project
        .cmd()
        .args(["--dry-run", "build", "--steps", "1,9"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown build step"));
}

#[test]
fn build_refuses_existing_image() {
    let project = TestProject::new();
    let image = PathBuf::from(project.status_json()["image"].as_str().unwrap());
    std::fs::write(&image, "old").unwrap();

    let output = project.cmd().args(["--dry-run", "build"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("existing image"));
}

#[test]
fn mount_without_image_fails() {
    let project = TestProject::new();
    let output = project.cmd().args(["--dry-run", "mount"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("condainer build"));
}

#[test]
fn dry_run_mount_describes_the_mount() {
    let project = TestProject::new();
    let image = PathBuf::from(project.status_json()["image"].as_str().unwrap());
    std::fs::write(&image, "hsqs").unwrap();

    let output = project.cmd().args(["--dry-run", "mount"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[dry-run] squashfuse"));
    assert!(!project.mount_point().exists());
}

#[test]
fn mount_when_mounted_is_a_no_op() {
    let project = TestProject::new();
    project.mark_mounted();

    let output = project.cmd().arg("mount").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("already mounted"));

    let output = project.cmd().args(["mount", "--print"]).output().unwrap();
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim_end(),
        project.mount_point().to_string_lossy()
    );
}

#[test]
fn umount_when_not_mounted_is_a_no_op() {
    let project = TestProject::new();
    let output = project.cmd().arg("umount").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("not mounted"));

    let quiet = project.cmd().args(["--quiet", "umount"]).output().unwrap();
    assert!(quiet.status.success());
    assert!(quiet.stdout.is_empty());
}

#[test]
fn exec_returns_child_exit_code() {
    let project = TestProject::new();
    project.mark_mounted();

    let output = project
        .cmd()
        .args(["exec", "sh", "-c", "exit 7"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn exec_requires_a_command() {
    let project = TestProject::new();
    let output = project.cmd().arg("exec").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn concurrent_exec_admits_exactly_one() {
    let project = TestProject::new();
    project.mark_mounted();

    let mut first = project
        .cmd()
        .args(["exec", "sleep", "2"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    std::thread::sleep(Duration::from_millis(500));

    let second = project.cmd().args(["exec", "true"]).output().unwrap();
    let first_status = first.wait().unwrap();

    assert!(first_status.success(), "first exec must run its command");
    assert!(!second.status.success(), "second exec must be refused");
    assert!(String::from_utf8_lossy(&second.stderr).contains("only one instance"));

    let leftovers: Vec<_> = std::fs::read_dir(project.path().join("mnt"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n.to_string_lossy().ends_with(".mutex"))
        .collect();
    assert!(leftovers.is_empty(), "lock file left behind: {leftovers:?}");
}

#[test]
fn prereq_json_lists_every_tool() {
    let output = Command::new(env!("CARGO_BIN_EXE_condainer"))
        .args(["--json", "prereq"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = json["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["curl", "mksquashfs", "squashfuse", "fusermount"]);
    assert_eq!(output.status.success(), json["ok"].as_bool().unwrap());
}

#[test]
fn completions_generate_for_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_condainer"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("condainer"));
}

#[test]
fn man_pages_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_condainer"))
        .arg("man-pages")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("condainer.1").is_file());
    assert!(dir.path().join("condainer-build.1").is_file());
}
