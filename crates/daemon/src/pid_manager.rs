//! PID file management for ensuring a single server instance
//!
//! The lock is held by a [`PidLock`] guard and released when it is dropped.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process;

use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LockError {
    #[error("another instance is already running with PID {pid} (lock file {})", path.display())]
    AlreadyRunning { pid: u32, path: PathBuf },
    #[error("lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Manages PID file operations for single-instance enforcement
#[derive(Debug, Clone)]
pub struct PidManager {
    pid_file_path: PathBuf,
}

impl PidManager {
    pub fn new<P: AsRef<Path>>(pid_file_path: P) -> Self {
        Self {
            pid_file_path: pid_file_path.as_ref().to_path_buf(),
        }
    }

    pub fn pid_file_path(&self) -> &Path {
        &self.pid_file_path
    }

    fn io_error(&self, source: io::Error) -> LockError {
        LockError::Io {
            path: self.pid_file_path.clone(),
            source,
        }
    }

    /// Write the current PID to the lock file.
    ///
    /// Fails if the file names a process that is still alive. A stale or
    /// unreadable file is replaced.
    pub fn acquire(&self) -> Result<PidLock, LockError> {
        if self.pid_file_path.exists() {
            match self.read_existing_pid() {
                Some(pid) if is_process_running(pid) => {
                    return Err(LockError::AlreadyRunning {
                        pid,
                        path: self.pid_file_path.clone(),
                    });
                }
                Some(pid) => {
                    info!(pid, "Removing stale lock file");
                    self.remove()?;
                }
                None => {
                    warn!(path = %self.pid_file_path.display(), "Unreadable lock file, replacing it");
                    self.remove()?;
                }
            }
        }

        if let Some(parent) = self.pid_file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let pid = process::id();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(&self.pid_file_path)
            .map_err(|e| self.io_error(e))?;
        write!(file, "{}", pid).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;

        info!(path = %self.pid_file_path.display(), pid, "Lock file created");
        Ok(PidLock {
            manager: self.clone(),
        })
    }

    /// Whether the lock file names a live process.
    pub fn is_running(&self) -> bool {
        self.read_existing_pid().is_some_and(is_process_running)
    }

    fn read_existing_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.pid_file_path)
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    fn remove(&self) -> Result<(), LockError> {
        match fs::remove_file(&self.pid_file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Signal 0 probes for existence without delivering anything.
fn is_process_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // EPERM: exists but belongs to someone else
        Err(_) => true,
    }
}

/// Held lock; removes the PID file on drop.
#[derive(Debug)]
pub struct PidLock {
    manager: PidManager,
}

impl PidLock {
    pub fn path(&self) -> &Path {
        self.manager.pid_file_path()
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        match self.manager.remove() {
            Ok(()) => debug!(path = %self.path().display(), "Lock file removed"),
            Err(e) => warn!("Failed to release lock file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_and_release_lock() {
        let temp_dir = tempdir().unwrap();
        let pid_file = temp_dir.path().join("test.pid");
        let manager = PidManager::new(&pid_file);

        let lock = manager.acquire().unwrap();
        assert_eq!(lock.path(), pid_file);
        assert_eq!(
            fs::read_to_string(&pid_file).unwrap(),
            process::id().to_string()
        );
        assert!(manager.is_running());

        drop(lock);
        assert!(!pid_file.exists());
        assert!(!manager.is_running());
    }

    #[test]
    fn test_double_lock_prevention() {
        let temp_dir = tempdir().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        let _lock = PidManager::new(&pid_file).acquire().unwrap();
        let second = PidManager::new(&pid_file).acquire();
        assert!(matches!(second, Err(LockError::AlreadyRunning { .. })));

        // The failed attempt must not remove the holder's file
        assert!(pid_file.exists());
    }

    #[test]
    fn test_stale_pid_cleanup() {
        let temp_dir = tempdir().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        // PIDs this large are above any kernel pid_max
        fs::write(&pid_file, "999999999").unwrap();
        let manager = PidManager::new(&pid_file);
        assert!(!manager.is_running());

        let _lock = manager.acquire().unwrap();
        assert_eq!(
            fs::read_to_string(&pid_file).unwrap(),
            process::id().to_string()
        );
    }

    #[test]
    fn test_garbage_lock_file_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let pid_file = temp_dir.path().join("test.pid");
        fs::write(&pid_file, "not a pid").unwrap();

        let _lock = PidManager::new(&pid_file).acquire().unwrap();
        assert!(PidManager::new(&pid_file).is_running());
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let pid_file = temp_dir.path().join("run").join("test.pid");

        let _lock = PidManager::new(&pid_file).acquire().unwrap();
        assert!(pid_file.exists());
    }
}
