use crate::CoreError;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Non-blocking mutual exclusion over a named resource.
///
/// Contention is a normal outcome (`Ok(None)`), never an error and never a wait.
pub trait LockProvider: Send + Sync {
    fn try_acquire(&self, resource: &Path) -> Result<Option<LockHandle>, CoreError>;
}

/// A lock held by the current process.
pub trait HeldLock: Send {
    fn release(self: Box<Self>) -> Result<(), CoreError>;
}

/// Owned handle to a held lock. Dropping it releases the lock, so no exit
/// path (error, early return, unwinding) can leak it.
pub struct LockHandle {
    inner: Option<Box<dyn HeldLock>>,
}

impl LockHandle {
    pub fn new(lock: impl HeldLock + 'static) -> Self {
        Self {
            inner: Some(Box::new(lock)),
        }
    }

    pub fn release(mut self) -> Result<(), CoreError> {
        match self.inner.take() {
            Some(lock) => lock.release(),
            None => Ok(()),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Some(lock) = self.inner.take() {
            if let Err(e) = lock.release() {
                warn!("failed to release lock: {e}");
            }
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("held", &self.inner.is_some())
            .finish()
    }
}

/// Release `handle`; passing `None` is a no-op.
pub fn release(handle: Option<LockHandle>) -> Result<(), CoreError> {
    handle.map_or(Ok(()), LockHandle::release)
}

/// Advisory `flock(2)` on a lock file. The kernel drops the lock when the
/// holder dies, so a leftover file without a holder never blocks anyone.
pub struct ExecLock {
    lock_file: Option<File>,
    path: PathBuf,
}

impl ExecLock {
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired lock {}", lock_path.display());
                Ok(Some(Self {
                    lock_file: Some(file),
                    path: lock_path.to_path_buf(),
                }))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                debug!("lock {} is held by another process", lock_path.display());
                Ok(None)
            }
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Order matters: unlock, unlink, close. Unlinking first would let a second
    // process create a fresh file at the same path and lock a different inode
    // while this one is still held.
    fn unlock_and_remove(&mut self) -> Result<(), CoreError> {
        let Some(file) = self.lock_file.take() else {
            return Ok(());
        };
        let unlocked = FileExt::unlock(&file);
        let removed = match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        drop(file);
        debug!("released lock {}", self.path.display());
        unlocked?;
        removed?;
        Ok(())
    }
}

impl HeldLock for ExecLock {
    fn release(mut self: Box<Self>) -> Result<(), CoreError> {
        self.unlock_and_remove()
    }
}

impl Drop for ExecLock {
    fn drop(&mut self) {
        let _ = self.unlock_and_remove();
    }
}

/// Lock files on the local filesystem, shared between processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLockProvider;

impl LockProvider for FileLockProvider {
    fn try_acquire(&self, resource: &Path) -> Result<Option<LockHandle>, CoreError> {
        Ok(ExecLock::try_acquire(resource)?.map(LockHandle::new))
    }
}

/// Process-local locks for tests that run several projects in one process.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLockProvider {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InMemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, resource: &Path) -> bool {
        self.held.lock().is_ok_and(|h| h.contains(resource))
    }
}

struct InMemoryLock {
    held: Arc<Mutex<HashSet<PathBuf>>>,
    resource: PathBuf,
}

impl HeldLock for InMemoryLock {
    fn release(self: Box<Self>) -> Result<(), CoreError> {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.resource);
        }
        Ok(())
    }
}

impl LockProvider for InMemoryLockProvider {
    fn try_acquire(&self, resource: &Path) -> Result<Option<LockHandle>, CoreError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| CoreError::Io(std::io::Error::other(format!("mutex poisoned: {e}"))))?;
        if !held.insert(resource.to_path_buf()) {
            return Ok(None);
        }
        Ok(Some(LockHandle::new(InMemoryLock {
            held: Arc::clone(&self.held),
            resource: resource.to_path_buf(),
        })))
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C requests a graceful stop; the child process in the foreground
/// receives the signal too, so cleanup and lock release still run. A second
/// Ctrl-C exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, finishing current step...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.mutex");

        let lock = FileLockProvider.try_acquire(&lock_path).unwrap();
        assert!(lock.is_some());
        assert!(lock_path.exists());
        release(lock).unwrap();
        assert!(!lock_path.exists());

        let again = FileLockProvider.try_acquire(&lock_path).unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.mutex");

        let _lock = ExecLock::try_acquire(&lock_path).unwrap().unwrap();
        let result = ExecLock::try_acquire(&lock_path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn lock_released_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.mutex");

        {
            let _lock = FileLockProvider.try_acquire(&lock_path).unwrap().unwrap();
        }
        assert!(!lock_path.exists());

        let lock2 = ExecLock::try_acquire(&lock_path).unwrap();
        assert!(lock2.is_some());
    }

    #[test]
    fn stale_unlocked_file_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.mutex");
        std::fs::write(&lock_path, "").unwrap();

        let lock = ExecLock::try_acquire(&lock_path).unwrap();
        assert!(lock.is_some());
    }

    #[test]
    fn release_none_is_noop() {
        release(None).unwrap();
    }

    #[test]
    fn in_memory_locks_exclude_per_resource() {
        let locks = InMemoryLockProvider::new();
        let a = Path::new("/tmp/a.mutex");
        let b = Path::new("/tmp/b.mutex");

        let held = locks.try_acquire(a).unwrap().unwrap();
        assert!(locks.is_held(a));
        assert!(locks.try_acquire(a).unwrap().is_none());
        assert!(locks.try_acquire(b).unwrap().is_some());

        held.release().unwrap();
        assert!(!locks.is_held(a));
        assert!(locks.try_acquire(a).unwrap().is_some());
    }
}
