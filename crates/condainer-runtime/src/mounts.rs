use crate::RuntimeError;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_MOUNT_TABLE: &str = "/proc/mounts";

/// The live mount table. Never cached: other processes may mount or unmount
/// between any two queries.
#[derive(Debug, Clone)]
pub struct MountTable {
    path: PathBuf,
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_TABLE)
    }
}

impl MountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some entry's mount point is exactly `mount_point`, byte for byte.
    pub fn is_mounted(&self, mount_point: &Path) -> Result<bool, RuntimeError> {
        let content = fs::read(&self.path).map_err(|source| RuntimeError::MountTable {
            path: self.path.clone(),
            source,
        })?;
        Ok(table_contains(&content, mount_point))
    }
}

fn table_contains(content: &[u8], mount_point: &Path) -> bool {
    let wanted = mount_point.as_os_str().as_bytes();
    content.split(|&b| b == b'\n').any(|line| {
        line.split(u8::is_ascii_whitespace)
            .filter(|field| !field.is_empty())
            .nth(1)
            == Some(wanted)
    })
}
