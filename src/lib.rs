//! # hosts-blocker
//!
//! Block websites by redirecting them to a loopback address in the system
//! hosts file, optionally only during a daily time window.
//!
//! A [`Driver`] re-evaluates the blocking decision every few seconds from a
//! fresh snapshot of the toggle state ([`StateSource`]) and the site list
//! ([`SiteRegistry`]), and hands it to [`HostsFile::reconcile`], which
//! recomputes the desired file content from scratch and replaces the file
//! atomically. Lines the blocker did not write are preserved.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use hosts_blocker::{Driver, HostsFile, SharedState, SiteRegistry, SqliteRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut registry = SqliteRegistry::open("websites.db")?;
//! registry.add("example.com")?;
//!
//! let hosts = HostsFile::default();
//! hosts.backup("/etc/hosts.backup")?;
//!
//! let state = SharedState::default();
//! state.set_enabled(true);
//! state.set_time_restricted(true);
//! state.set_window("09:00-17:00".parse()?);
//!
//! let driver = Driver::new(hosts, registry, state);
//! let cancel = CancellationToken::new();
//! driver.run(cancel).await;
//! ```
//!
//! ## Matching
//!
//! A site counts as blocked if its hostname appears anywhere in the hosts
//! file, and unblocking drops every line containing it. Hostnames that are
//! substrings of other entries match those entries too.
//!
//! ## Permissions
//!
//! Replacing the system hosts file requires administrator rights. The
//! caller is responsible for privilege elevation.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod block_page;
pub mod config;
pub mod driver;
pub mod error;
pub mod hosts_file;
pub mod lock;
pub mod registry;
pub mod schedule;
pub mod state;
pub mod util;

pub use config::Settings;
pub use driver::{Driver, TickReport, decide, delete_site, update_site};
pub use error::{BlockerError, Result};
pub use hosts_file::{Change, DEFAULT_REDIRECT, HostsFile, TargetState};
pub use lock::InstanceLock;
pub use registry::{SiteRecord, SiteRegistry, SqliteRegistry};
pub use schedule::BlockWindow;
pub use state::{BlockerState, SharedState, StateFile, StateSource};
