use std::fmt;
use std::path::PathBuf;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

/// Availability of one external tool, as reported by `condainer prereq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub purpose: &'static str,
    pub path: Option<PathBuf>,
}

struct Tool {
    name: &'static str,
    purpose: &'static str,
    install_hint: &'static str,
}

const CURL: Tool = Tool {
    name: "curl",
    purpose: "downloading the installer",
    install_hint: "zypper install curl | apt install curl | dnf install curl | pacman -S curl",
};

const MKSQUASHFS: Tool = Tool {
    name: "mksquashfs",
    purpose: "packing the environment into a squashfs image",
    install_hint: "zypper install squashfs | apt install squashfs-tools | dnf install squashfs-tools | pacman -S squashfs-tools",
};

const SQUASHFUSE: Tool = Tool {
    name: "squashfuse",
    purpose: "mounting the image without root privileges",
    install_hint: "zypper install squashfuse | apt install squashfuse | dnf install squashfuse | pacman -S squashfuse",
};

const FUSERMOUNT: Tool = Tool {
    name: "fusermount",
    purpose: "unmounting the image",
    install_hint: "part of fuse (zypper install fuse | apt install fuse | dnf install fuse)",
};

const ALL_TOOLS: [&Tool; 4] = [&CURL, &MKSQUASHFS, &SQUASHFUSE, &FUSERMOUNT];

fn which(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

fn missing_of(tools: &[&Tool]) -> Vec<MissingPrereq> {
    tools
        .iter()
        .filter(|t| which(t.name).is_none())
        .map(|t| MissingPrereq {
            name: t.name,
            purpose: t.purpose,
            install_hint: t.install_hint,
        })
        .collect()
}

/// Tools needed by `build`. Mounting is not part of the pipeline.
pub fn check_build_prereqs() -> Vec<MissingPrereq> {
    missing_of(&[&MKSQUASHFS])
}

/// Tools needed by `mount`, `umount` and `exec`.
pub fn check_mount_prereqs() -> Vec<MissingPrereq> {
    missing_of(&[&SQUASHFUSE, &FUSERMOUNT])
}

/// Resolve every external tool on `PATH`.
pub fn tool_report() -> Vec<ToolStatus> {
    ALL_TOOLS
        .iter()
        .map(|t| ToolStatus {
            name: t.name,
            purpose: t.purpose,
            path: which(t.name),
        })
        .collect()
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nCondainer drives these tools to build and mount images.");
    msg
}
