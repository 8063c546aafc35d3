//! Error types.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for blocker operations.
pub type Result<T> = std::result::Result<T, BlockerError>;

/// Errors returned by blocker operations.
#[derive(Debug, Error)]
pub enum BlockerError {
    /// Invalid configuration values (time of day, URL, settings or state file).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The site registry failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No site record exists with the given id.
    #[error("site not found: {id}")]
    SiteNotFound {
        /// The requested id.
        id: i64,
    },

    /// The override file is missing, unreadable, or could not be replaced.
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying failure.
        source: std::io::Error,
    },

    /// Writing the replacement content failed part-way. The original file
    /// is left untouched.
    #[error("interrupted write to {}: {source}", .path.display())]
    PartialWrite {
        /// The file that was being replaced.
        path: PathBuf,
        /// The underlying failure.
        source: std::io::Error,
    },

    /// Another live blocker process holds the instance lock.
    #[error("another blocker is already running (pid={pid})")]
    AlreadyRunning {
        /// PID recorded in the lock file.
        pid: u32,
    },

    /// A reconciliation tick did not finish in time.
    #[error("reconciliation tick exceeded {secs}s")]
    TickTimedOut {
        /// The timeout that was exceeded.
        secs: u64,
    },

    /// The previous tick has not finished yet, so this one was skipped.
    #[error("previous reconciliation tick still running")]
    TickInFlight,

    /// Any other filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlockerError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    fn io_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::FileAccess { source, .. } | Self::PartialWrite { source, .. } | Self::Io(source) => {
                Some(source.kind())
            }
            _ => None,
        }
    }

    /// Returns `true` if the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(ErrorKind::NotFound)
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.io_kind() == Some(ErrorKind::PermissionDenied)
    }

    /// Returns `true` if the underlying I/O error is `StorageFull`.
    #[must_use]
    pub fn is_storage_full(&self) -> bool {
        self.io_kind() == Some(ErrorKind::StorageFull)
    }
}
