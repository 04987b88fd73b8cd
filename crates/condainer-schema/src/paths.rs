//! Canonical locations derived from a [`ProjectConfig`].
//!
//! Everything here is a pure function of the configuration and a [`HostContext`]
//! captured once per invocation. Nothing is persisted separately, so the paths
//! can never diverge from the descriptor.

use crate::config::ProjectConfig;
use crate::environment::DEFAULT_ENV_NAME;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Host facts the resolver depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub hostname: String,
    pub uid: u32,
}

/// Safe wrapper around libc::getuid().
#[allow(unsafe_code)]
fn current_uid() -> u32 {
    // SAFETY: getuid() is always safe: no arguments, no side effects, cannot fail.
    unsafe { libc::getuid() }
}

impl HostContext {
    pub fn new(hostname: impl Into<String>, uid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            uid,
        }
    }

    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_owned());
        Self::new(hostname, current_uid())
    }
}

pub fn mount_directory(cfg: &ProjectConfig, host: &HostContext) -> PathBuf {
    let mut leaf = format!("condainer-{}", cfg.uuid);
    if cfg.multiuser_mountpoint {
        leaf.push('-');
        leaf.push_str(&host.uid.to_string());
    }
    cfg.mount_base_directory.join(leaf)
}

pub fn image_file_name(cfg: &ProjectConfig) -> String {
    format!("{}.squashfs", cfg.uuid)
}

/// Lock file scoped to (project, host): a project directory shared over a
/// network filesystem must not serialize `exec` across hosts with local mounts.
pub fn lock_file_name(cfg: &ProjectConfig, host: &HostContext) -> PathBuf {
    let mut name: OsString = mount_directory(cfg, host).into_os_string();
    name.push(format!("-{}.mutex", host.hostname));
    PathBuf::from(name)
}

fn env_name(cfg: &ProjectConfig) -> &str {
    cfg.user_env_name.as_deref().unwrap_or(DEFAULT_ENV_NAME)
}

/// Quote `s` for a POSIX shell word. Plain words are returned unchanged.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,+@%".contains(&b));
    if plain {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Shell line that activates the mounted environment. Every path is quoted so
/// the line survives directories with spaces.
pub fn activation_command(cfg: &ProjectConfig, host: &HostContext) -> String {
    let bin = mount_directory(cfg, host).join("bin");
    if cfg.non_conda_application {
        format!("export PATH={}:\"$PATH\"", quote_path(&bin))
    } else {
        format!(
            "source {} {}",
            quote_path(&bin.join("activate")),
            shell_quote(env_name(cfg))
        )
    }
}

pub fn deactivation_command(cfg: &ProjectConfig) -> &'static str {
    if cfg.non_conda_application {
        "hash -r"
    } else {
        "conda deactivate"
    }
}

/// Directory prepended to `PATH` for commands run through `exec`.
pub fn env_bin_directory(cfg: &ProjectConfig, host: &HostContext) -> PathBuf {
    let mount_dir = mount_directory(cfg, host);
    if cfg.non_conda_application {
        mount_dir.join("bin")
    } else {
        mount_dir.join("envs").join(env_name(cfg)).join("bin")
    }
}

/// Local installer location; remote installers land in the project directory
/// under the last segment of their URL.
pub fn installer_path(cfg: &ProjectConfig, project_dir: &Path) -> PathBuf {
    if cfg.installer_is_remote() {
        let file = cfg
            .installer_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("installer.sh");
        project_dir.join(file)
    } else {
        project_dir.join(&cfg.installer_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitOptions;

    fn sample() -> (ProjectConfig, HostContext) {
        let mut cfg = ProjectConfig::new(&InitOptions::default());
        cfg.uuid = "0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11".parse().unwrap();
        (cfg, HostContext::new("node01", 1234))
    }

    #[test]
    fn mount_directory_default_layout() {
        let (cfg, host) = sample();
        assert_eq!(
            mount_directory(&cfg, &host),
            PathBuf::from("/tmp/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11")
        );
    }

    #[test]
    fn mount_directory_is_deterministic() {
        let (cfg, host) = sample();
        assert_eq!(mount_directory(&cfg, &host), mount_directory(&cfg, &host));
        assert_eq!(
            mount_directory(&cfg.clone(), &host.clone()),
            mount_directory(&cfg, &host)
        );
    }

    #[test]
    fn multiuser_mount_directory_has_uid_suffix() {
        let (mut cfg, host) = sample();
        cfg.multiuser_mountpoint = true;
        assert_eq!(
            mount_directory(&cfg, &host),
            PathBuf::from("/tmp/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11-1234")
        );
    }

    #[test]
    fn image_is_named_after_uuid() {
        let (cfg, _) = sample();
        assert_eq!(
            image_file_name(&cfg),
            "0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11.squashfs"
        );
    }

    #[test]
    fn lock_file_is_scoped_by_host() {
        let (cfg, host) = sample();
        assert_eq!(
            lock_file_name(&cfg, &host),
            PathBuf::from("/tmp/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11-node01.mutex")
        );
        let other = HostContext::new("node02", 1234);
        assert_ne!(lock_file_name(&cfg, &host), lock_file_name(&cfg, &other));
    }

    #[test]
    fn activation_uses_resolved_env_name() {
        let (mut cfg, host) = sample();
        assert!(activation_command(&cfg, &host).ends_with("bin/activate condainer"));
        cfg.user_env_name = Some("basicnumpy".to_owned());
        assert_eq!(
            activation_command(&cfg, &host),
            "source /tmp/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11/bin/activate basicnumpy"
        );
    }

    #[test]
    fn non_conda_application_paths() {
        let (mut cfg, host) = sample();
        cfg.non_conda_application = true;
        assert_eq!(
            env_bin_directory(&cfg, &host),
            mount_directory(&cfg, &host).join("bin")
        );
        assert_eq!(
            activation_command(&cfg, &host),
            "export PATH=/tmp/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11/bin:\"$PATH\""
        );
    }

    #[test]
    fn activation_quotes_awkward_paths() {
        let (mut cfg, host) = sample();
        cfg.mount_base_directory = PathBuf::from("/scratch/my envs");
        cfg.user_env_name = Some("it's".to_owned());
        assert_eq!(
            activation_command(&cfg, &host),
            "source '/scratch/my envs/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11/bin/activate' 'it'\\''s'"
        );
        cfg.non_conda_application = true;
        assert_eq!(
            activation_command(&cfg, &host),
            "export PATH='/scratch/my envs/condainer-0b6d1c5e-8f55-4c55-9d3a-0e3c2b0b7a11/bin':\"$PATH\""
        );
    }

    #[test]
    fn shell_quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("/opt/env-1/bin"), "/opt/env-1/bin");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn env_bin_directory_points_into_envs() {
        let (mut cfg, host) = sample();
        cfg.user_env_name = Some("sci".to_owned());
        assert_eq!(
            env_bin_directory(&cfg, &host),
            mount_directory(&cfg, &host).join("envs/sci/bin")
        );
    }

    #[test]
    fn installer_path_for_url_and_local_file() {
        let (mut cfg, _) = sample();
        let project = Path::new("/work/proj");
        assert_eq!(
            installer_path(&cfg, project),
            PathBuf::from("/work/proj/Miniforge3-Linux-x86_64.sh")
        );
        cfg.installer_url = "/opt/installers/Miniforge3.sh".to_owned();
        assert_eq!(
            installer_path(&cfg, project),
            PathBuf::from("/opt/installers/Miniforge3.sh")
        );
    }
}
