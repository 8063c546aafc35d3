//! Process settings.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BlockerError, Result};
use crate::hosts_file::{DEFAULT_REDIRECT, HostsFile};

/// Settings loaded from a TOML file. Every key is optional.
///
/// # Example
///
/// ```
/// use hosts_blocker::Settings;
///
/// let settings: Settings = toml::from_str(r#"
///     hosts_path = "/tmp/hosts"
///     interval_secs = 10
/// "#).unwrap();
///
/// assert_eq!(settings.redirect, "127.0.0.1");
/// assert_eq!(settings.backup_path().to_str(), Some("/tmp/hosts.backup"));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Hosts file to manage.
    pub hosts_path: PathBuf,

    /// Startup backup location. Defaults to `hosts.backup` beside
    /// [`hosts_path`](Self::hosts_path).
    pub backup_path: Option<PathBuf>,

    /// Address blocked hostnames resolve to.
    pub redirect: String,

    /// Site registry database.
    pub database: PathBuf,

    /// Toggle state file.
    pub state_file: PathBuf,

    /// Single-instance lock file.
    pub lock_file: PathBuf,

    /// Seconds between reconciliation ticks.
    pub interval_secs: u64,

    /// Seconds a tick may take before it is reported as hung.
    pub tick_timeout_secs: u64,

    /// Address for the block page, if it should be served.
    pub block_page: Option<SocketAddr>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosts_path: HostsFile::default_path().to_path_buf(),
            backup_path: None,
            redirect: DEFAULT_REDIRECT.to_string(),
            database: PathBuf::from("websites.db"),
            state_file: PathBuf::from("blocker-state.toml"),
            lock_file: PathBuf::from("hosts-blocker.lock"),
            interval_secs: 5,
            tick_timeout_secs: 10,
            block_page: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] if the file is malformed or a
    /// value is out of range, and [`BlockerError::FileAccess`] if it cannot
    /// be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| BlockerError::InvalidConfig(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                Self::default()
            }
            Err(e) => return Err(BlockerError::file_access(path, e)),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] for a zero interval or
    /// timeout, or a blank redirect address.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(BlockerError::InvalidConfig("interval_secs must be > 0".into()));
        }
        if self.tick_timeout_secs == 0 {
            return Err(BlockerError::InvalidConfig(
                "tick_timeout_secs must be > 0".into(),
            ));
        }
        if self.redirect.trim().is_empty() {
            return Err(BlockerError::InvalidConfig("redirect must not be empty".into()));
        }
        Ok(())
    }

    /// Resolved backup location.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.backup_path.clone().unwrap_or_else(|| {
            self.hosts_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("hosts.backup")
        })
    }

    /// Tick period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Tick timeout.
    #[must_use]
    pub const fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout_secs)
    }

    /// Hosts file manager for these settings.
    #[must_use]
    pub fn hosts_file(&self) -> HostsFile {
        HostsFile::new(&self.hosts_path).with_redirect(self.redirect.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(s.redirect, "127.0.0.1");
        assert_eq!(s.interval(), Duration::from_secs(5));
        assert_eq!(s.hosts_path, HostsFile::default_path());
        assert!(s.block_page.is_none());
    }

    #[test]
    fn loads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocker.toml");
        std::fs::write(
            &path,
            "hosts_path = \"/tmp/hosts\"\nredirect = \"0.0.0.0\"\ninterval_secs = 30\nblock_page = \"127.0.0.1:8080\"\n",
        )
        .unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.hosts_path, PathBuf::from("/tmp/hosts"));
        assert_eq!(s.backup_path(), PathBuf::from("/tmp/hosts.backup"));
        assert_eq!(s.hosts_file().redirect(), "0.0.0.0");
        assert_eq!(s.interval_secs, 30);
        assert_eq!(s.block_page, Some("127.0.0.1:8080".parse().unwrap()));
    }

    #[test]
    fn explicit_backup_path_wins() {
        let s = Settings {
            backup_path: Some(PathBuf::from("/var/backups/hosts")),
            ..Settings::default()
        };
        assert_eq!(s.backup_path(), PathBuf::from("/var/backups/hosts"));
    }

    #[test]
    fn rejects_zero_interval_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocker.toml");

        std::fs::write(&path, "interval_secs = 0\n").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(BlockerError::InvalidConfig(_))
        ));

        std::fs::write(&path, "hosts = \"/etc/hosts\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
