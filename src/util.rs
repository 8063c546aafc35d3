//! Internal utilities.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{BlockerError, Result};

/// Checks whether the process with the given PID is still alive.
///
/// Uses `kill(pid, 0)`: signal 0 checks existence without delivering a signal.
/// `EPERM` means the process exists but belongs to another user.
#[cfg(unix)]
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: `kill(pid, 0)` is a standard POSIX existence check that does
    // not deliver any signal.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Without a liveness probe every recorded PID is treated as alive.
#[cfg(not(unix))]
#[must_use]
pub const fn is_process_alive(_pid: u32) -> bool {
    true
}

/// Replaces `path` with `contents` atomically.
///
/// # Errors
///
/// See [`replace_file_with`].
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    replace_file_with(path, |file| file.write_all(contents))
}

/// Replaces `path` with whatever `write` produces, via a temporary file in
/// the same directory that is synced and then renamed over the target.
///
/// Readers see either the old content or the new content, never a partial
/// file. Permissions of an existing target are carried over.
///
/// # Errors
///
/// Returns [`BlockerError::FileAccess`] if the temporary file cannot be
/// created or renamed into place, and [`BlockerError::PartialWrite`] if
/// `write` or the sync fails. In both cases the target is left untouched
/// and the temporary file is removed.
pub fn replace_file_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| BlockerError::file_access(path, e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| BlockerError::file_access(path, e))?;
    }

    write(tmp.as_file_mut())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|source| BlockerError::PartialWrite {
            path: path.to_path_buf(),
            source,
        })?;

    tmp.persist(path)
        .map_err(|e| BlockerError::file_access(path, e.error))?;
    Ok(())
}
