//! Hosts file reconciliation.
//!
//! Each pass recomputes the desired content from scratch for the requested
//! [`TargetState`] and replaces the file atomically when anything changed.
//! Lines that do not mention a registered URL are never touched.
//!
//! Presence is decided by substring containment: a URL counts as already
//! redirected if it appears anywhere in the file, and unblocking drops every
//! line that contains it. A URL that is a substring of an unrelated entry
//! (`example.com` inside `myexample.com`) is therefore matched as well.

use std::path::{Path, PathBuf};

use crate::error::{BlockerError, Result};
use crate::registry::SiteRecord;
use crate::util::write_atomic;

/// Loopback address managed entries resolve to.
pub const DEFAULT_REDIRECT: &str = "127.0.0.1";

#[cfg(windows)]
const DEFAULT_HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(windows))]
const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

/// Whether registered sites should currently be redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Every registered URL has a redirect line.
    Blocking,
    /// No line mentions a registered URL.
    NotBlocking,
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Blocking => "blocking",
            Self::NotBlocking => "not blocking",
        })
    }
}

/// Lines added and removed by one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// Redirect lines appended.
    pub added: usize,
    /// Lines dropped because they mention a registered URL.
    pub removed: usize,
}

impl Change {
    /// Returns `true` if the pass left the file untouched.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Manages redirect entries in a hosts file.
///
/// # Example
///
/// ```rust,ignore
/// use hosts_blocker::{HostsFile, SiteRecord, TargetState};
///
/// let hosts = HostsFile::new(HostsFile::default_path());
/// hosts.backup("/etc/hosts.backup")?;
///
/// let sites = vec![SiteRecord::new(1, "example.com")];
/// hosts.reconcile(&sites, TargetState::Blocking)?;
/// ```
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
    redirect: String,
}

impl HostsFile {
    /// Creates a manager for the hosts file at `path`, redirecting to
    /// [`DEFAULT_REDIRECT`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            redirect: DEFAULT_REDIRECT.to_string(),
        }
    }

    /// Overrides the redirect address.
    #[must_use]
    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = redirect.into();
        self
    }

    /// The platform's hosts file location.
    #[must_use]
    pub fn default_path() -> &'static Path {
        Path::new(DEFAULT_HOSTS_PATH)
    }

    /// Returns the managed file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the redirect address.
    #[must_use]
    pub fn redirect(&self) -> &str {
        &self.redirect
    }

    /// Copies the hosts file to `to`, overwriting any previous backup.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::FileAccess`] if the hosts file cannot be read
    /// or the backup cannot be written.
    pub fn backup(&self, to: impl AsRef<Path>) -> Result<()> {
        let to = to.as_ref();
        let content =
            std::fs::read(&self.path).map_err(|e| BlockerError::file_access(&self.path, e))?;
        std::fs::write(to, content).map_err(|e| BlockerError::file_access(to, e))?;
        tracing::info!(
            path = %self.path.display(),
            backup = %to.display(),
            "Backed up hosts file"
        );
        Ok(())
    }

    /// Brings the file in line with `target` for the given sites.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::FileAccess`] if the file is missing or cannot
    /// be read or replaced, and [`BlockerError::PartialWrite`] if writing
    /// the replacement fails. The file keeps its previous content on error.
    pub fn reconcile(&self, sites: &[SiteRecord], target: TargetState) -> Result<Change> {
        match target {
            TargetState::Blocking => self.block(sites),
            TargetState::NotBlocking => self.unblock(sites),
        }
    }

    /// Appends a redirect line for every site not yet present in the file.
    ///
    /// # Errors
    ///
    /// See [`reconcile`](Self::reconcile).
    pub fn block(&self, sites: &[SiteRecord]) -> Result<Change> {
        let content = self.read()?;
        let (updated, added) = with_redirects(&content, &self.redirect, active_urls(sites));
        let change = Change { added, removed: 0 };
        self.commit(&updated, change)?;
        Ok(change)
    }

    /// Drops every line that mentions one of the sites.
    ///
    /// # Errors
    ///
    /// See [`reconcile`](Self::reconcile).
    pub fn unblock(&self, sites: &[SiteRecord]) -> Result<Change> {
        let content = self.read()?;
        let urls: Vec<&str> = active_urls(sites).collect();
        let (updated, removed) = without_urls(&content, &urls);
        let change = Change { added: 0, removed };
        self.commit(&updated, change)?;
        Ok(change)
    }

    /// Returns the URLs among `sites` that currently appear in the file.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::FileAccess`] if the file cannot be read.
    pub fn blocked_urls(&self, sites: &[SiteRecord]) -> Result<Vec<String>> {
        let content = self.read()?;
        Ok(active_urls(sites)
            .filter(|url| content.contains(url))
            .map(str::to_string)
            .collect())
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| BlockerError::file_access(&self.path, e))
    }

    fn commit(&self, updated: &str, change: Change) -> Result<()> {
        if change.is_noop() {
            tracing::debug!(path = %self.path.display(), "Hosts file already up to date");
            return Ok(());
        }
        write_atomic(&self.path, updated.as_bytes())?;
        tracing::info!(
            path = %self.path.display(),
            added = change.added,
            removed = change.removed,
            "Reconciled hosts file"
        );
        Ok(())
    }
}

impl Default for HostsFile {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

// ---------------------------------------------------------------------------
// Content helpers
// ---------------------------------------------------------------------------

/// Registered URLs, trimmed. Blank entries would match every line.
fn active_urls(sites: &[SiteRecord]) -> impl Iterator<Item = &str> {
    sites
        .iter()
        .map(|site| site.url.trim())
        .filter(|url| !url.is_empty())
}

/// Appends `"<redirect> <url>"` for each URL not already contained in the
/// content. Returns the new content and the number of lines added.
///
/// An unterminated last line gets a newline before the first appended line.
/// Unblocking later does not strip it again, so such a file comes back with
/// one extra trailing `\n`.
fn with_redirects<'a>(
    content: &str,
    redirect: &str,
    urls: impl Iterator<Item = &'a str>,
) -> (String, usize) {
    let mut out = content.to_string();
    let mut added = 0;
    for url in urls {
        if out.contains(url) {
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(redirect);
        out.push(' ');
        out.push_str(url);
        out.push('\n');
        added += 1;
    }
    (out, added)
}

/// Keeps every line, terminator included, that mentions none of the URLs.
/// Returns the new content and the number of lines dropped.
fn without_urls(content: &str, urls: &[&str]) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut removed = 0;
    for line in content.split_inclusive('\n') {
        if urls.iter().any(|url| line.contains(url)) {
            removed += 1;
        } else {
            out.push_str(line);
        }
    }
    (out, removed)
}
