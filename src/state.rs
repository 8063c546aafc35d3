//! User toggle state read by the driver on every tick.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{BlockerError, Result};
use crate::schedule::BlockWindow;
use crate::util::write_atomic;

/// Blocking toggles and the daily window.
///
/// Missing fields in a state file take the defaults: both toggles off and a
/// 09:00–17:00 window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockerState {
    /// Master switch.
    pub enabled: bool,
    /// Restrict blocking to [`window`](Self::window).
    pub time_restricted: bool,
    /// Daily block window.
    pub window: BlockWindow,
}

impl Default for BlockerState {
    fn default() -> Self {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default();
        Self {
            enabled: false,
            time_restricted: false,
            window: BlockWindow::new(nine, five),
        }
    }
}

/// Where the driver takes its per-tick state snapshot from.
pub trait StateSource: Send + Sync {
    /// Returns a consistent copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] or [`BlockerError::FileAccess`]
    /// if the state cannot be loaded.
    fn snapshot(&self) -> Result<BlockerState>;
}

/// In-process state shared between the driver and whoever sets the toggles.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<BlockerState>>,
}

impl SharedState {
    /// Wraps an initial state.
    #[must_use]
    pub fn new(state: BlockerState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Applies `f` to the state under the write lock.
    pub fn update(&self, f: impl FnOnce(&mut BlockerState)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    /// Sets the master switch.
    pub fn set_enabled(&self, enabled: bool) {
        self.update(|s| s.enabled = enabled);
    }

    /// Sets whether blocking follows the window.
    pub fn set_time_restricted(&self, restricted: bool) {
        self.update(|s| s.time_restricted = restricted);
    }

    /// Replaces the window.
    pub fn set_window(&self, window: BlockWindow) {
        self.update(|s| s.window = window);
    }
}

impl StateSource for SharedState {
    fn snapshot(&self) -> Result<BlockerState> {
        Ok(*self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// State persisted as TOML, so separate CLI invocations can flip toggles
/// while the driver runs.
///
/// ```toml
/// enabled = true
/// time_restricted = true
///
/// [window]
/// start = "22:00"
/// end = "06:00"
/// ```
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Targets the state file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] if the file is malformed or
    /// holds an invalid time, and [`BlockerError::FileAccess`] if it cannot
    /// be read.
    pub fn load(&self) -> Result<BlockerState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BlockerState::default());
            }
            Err(e) => return Err(BlockerError::file_access(&self.path, e)),
        };
        toml::from_str(&raw).map_err(|e| {
            BlockerError::InvalidConfig(format!("{}: {e}", self.path.display()))
        })
    }

    /// Writes `state` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::FileAccess`] or [`BlockerError::PartialWrite`]
    /// if the file cannot be replaced.
    pub fn save(&self, state: &BlockerState) -> Result<()> {
        let raw = toml::to_string(state)
            .map_err(|e| BlockerError::InvalidConfig(format!("cannot encode state: {e}")))?;
        write_atomic(&self.path, raw.as_bytes())
    }

    /// Loads, modifies and saves the state, returning the new value.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and [`save`](Self::save).
    pub fn modify(&self, f: impl FnOnce(&mut BlockerState)) -> Result<BlockerState> {
        let mut state = self.load()?;
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }
}

impl StateSource for StateFile {
    fn snapshot(&self) -> Result<BlockerState> {
        self.load()
    }
}
