//! Single-instance lock.
//!
//! Only one blocker may reconcile a given hosts file. The lock file records
//! the holder's PID so a lock left behind by a crashed process can be taken
//! over on the next start.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BlockerError, Result};
use crate::util::is_process_alive;

/// Held lock. Released by [`release`](Self::release) or on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Acquires the lock at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::AlreadyRunning`] if a live process holds the
    /// lock, or [`BlockerError::FileAccess`] if the lock file cannot be
    /// written.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            match read_pid(&path) {
                Some(pid) if pid != std::process::id() && is_process_alive(pid) => {
                    return Err(BlockerError::AlreadyRunning { pid });
                }
                stale => {
                    tracing::info!(pid = ?stale, path = %path.display(), "Taking over stale lock");
                    std::fs::remove_file(&path)
                        .map_err(|e| BlockerError::file_access(&path, e))?;
                }
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| BlockerError::file_access(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| BlockerError::file_access(&path, e))?;

        tracing::debug!(path = %path.display(), "Acquired instance lock");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::FileAccess`] if the file cannot be removed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_lock(&self.path)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = remove_lock(&self.path) {
                tracing::warn!(error = %e, "Failed to remove instance lock");
            }
        }
    }
}

fn remove_lock(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BlockerError::file_access(path, e)),
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
