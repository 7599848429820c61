//! Single-flight guard for training runs.
//!
//! Only one training run may be active per artifact root. The in-process
//! flag rejects concurrent requests from the HTTP server; the advisory lock
//! file rejects a second CLI process pointed at the same directory.
//!
//! The lock file records the holder's PID. A process that dies without
//! running `Drop` (abort, SIGKILL) leaves the file behind; the next
//! acquire finds the PID dead and reclaims it.

use crate::error::LockError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// File name of the advisory lock inside the artifact root.
pub const LOCK_FILE_NAME: &str = ".training.lock";

/// Shared handle to the training run lock. Cloning shares the flag.
#[derive(Debug, Clone)]
pub struct RunLock {
    running: Arc<AtomicBool>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Create a lock whose lock file lives in `artifact_root`.
    pub fn new(artifact_root: impl AsRef<Path>) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            lock_path: artifact_root.as_ref().join(LOCK_FILE_NAME),
        }
    }

    /// Try to start a run.
    ///
    /// Returns `Ok(None)` when a run is already in progress, in this process
    /// or in another one holding the lock file.
    pub fn try_acquire(&self) -> Result<Option<RunGuard>, LockError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        if let Some(parent) = self.lock_path.parent() {
            if let Err(source) = std::fs::create_dir_all(parent) {
                self.running.store(false, Ordering::Release);
                return Err(LockError::LockFile {
                    path: self.lock_path.clone(),
                    source,
                });
            }
        }

        match self.create_lock_file() {
            Ok(true) => Ok(Some(RunGuard {
                running: Arc::clone(&self.running),
                lock_path: self.lock_path.clone(),
            })),
            Ok(false) => {
                self.running.store(false, Ordering::Release);
                Ok(None)
            }
            Err(source) => {
                self.running.store(false, Ordering::Release);
                Err(LockError::LockFile {
                    path: self.lock_path.clone(),
                    source,
                })
            }
        }
    }

    /// Publish the lock file holding our PID. Returns `false` when a live
    /// process holds it; a dead holder's file is removed and retried once.
    fn create_lock_file(&self) -> std::io::Result<bool> {
        let pid = std::process::id();
        let staging = self.lock_path.with_extension(format!("lock.{pid}.tmp"));
        std::fs::write(&staging, format!("{pid}\n"))?;

        let mut result = Ok(false);
        for _ in 0..2 {
            match std::fs::hard_link(&staging, &self.lock_path) {
                Ok(()) => {
                    result = Ok(true);
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match holder_pid(&self.lock_path) {
                        Some(holder) if process_alive(holder) => {
                            tracing::warn!(
                                path = %self.lock_path.display(),
                                holder,
                                "Training lock held by another run"
                            );
                            result = Ok(false);
                            break;
                        }
                        holder => {
                            tracing::warn!(
                                path = %self.lock_path.display(),
                                holder = ?holder,
                                "Removing stale training lock"
                            );
                            if let Err(e) = std::fs::remove_file(&self.lock_path) {
                                if e.kind() != std::io::ErrorKind::NotFound {
                                    result = Err(e);
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&staging);
        result
    }

    /// Whether a run currently holds the lock in this process.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// PID recorded in a lock file, if it holds one.
fn holder_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks that the process exists.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Held for the duration of a run; releases the lock on drop.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
    lock_path: PathBuf,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            tracing::warn!(path = %self.lock_path.display(), error = %e, "Failed to remove training lock file");
        }
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_rejected_while_held() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path());

        let guard = lock.try_acquire().unwrap();
        assert!(guard.is_some());
        assert!(lock.is_running());
        assert!(lock.lock_path().exists());
        assert!(lock.clone().try_acquire().unwrap().is_none());

        drop(guard);
        assert!(!lock.is_running());
        assert!(!lock.lock_path().exists());
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_live_holder_blocks_acquire() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(LOCK_FILE_NAME),
            format!("{}\n", std::process::id()),
        )
        .unwrap();
        let lock = RunLock::new(dir.path());

        assert!(lock.try_acquire().unwrap().is_none());
        assert!(!lock.is_running());
        assert!(lock.lock_path().exists());
    }

    #[test]
    fn test_leaked_guard_blocks_other_locks() {
        let dir = TempDir::new().unwrap();
        let first = RunLock::new(dir.path());
        std::mem::forget(first.try_acquire().unwrap().unwrap());

        assert!(RunLock::new(dir.path()).try_acquire().unwrap().is_none());
        std::fs::remove_file(first.lock_path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_dead_holder_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE_NAME), format!("{dead_pid}\n")).unwrap();

        let lock = RunLock::new(dir.path());
        let guard = lock.try_acquire().unwrap();
        assert!(guard.is_some());
        assert_eq!(
            std::fs::read_to_string(lock.lock_path()).unwrap().trim(),
            std::process::id().to_string()
        );

        drop(guard);
        assert!(!lock.lock_path().exists());
    }

    #[test]
    fn test_unreadable_lock_file_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE_NAME), b"").unwrap();
        let lock = RunLock::new(dir.path());

        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_staging_file_is_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path());
        let _guard = lock.try_acquire().unwrap().unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(LOCK_FILE_NAME)]);
    }

    #[test]
    fn test_lock_creates_missing_artifact_root() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path().join("artifact"));
        let guard = lock.try_acquire().unwrap();
        assert!(guard.is_some());
    }
}
