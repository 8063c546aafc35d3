//! Periodic reconciliation.
//!
//! Every tick takes a fresh snapshot of the toggle state and the site list,
//! decides the target state, and reconciles the hosts file. Ticks never
//! overlap: the registry mutex is held for the whole pass, and a scheduled
//! tick is skipped while the previous one is still running. A failed tick is
//! logged and the next one simply tries again.
//!
//! Removing or renaming a site goes through [`delete_site`] and
//! [`update_site`], which drop the old redirect line first. Later passes only
//! know about registered URLs and would otherwise never clean it up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{BlockerError, Result};
use crate::hosts_file::{Change, HostsFile, TargetState};
use crate::registry::SiteRegistry;
use crate::state::{BlockerState, StateSource};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps toggle state and the current time to a target state.
///
/// | enabled | time restricted | inside window | target |
/// |---|---|---|---|
/// | no  | –   | –   | not blocking |
/// | yes | no  | –   | blocking |
/// | yes | yes | yes | blocking |
/// | yes | yes | no  | not blocking |
#[must_use]
pub fn decide(state: &BlockerState, now: NaiveTime) -> TargetState {
    let active = state.enabled && (!state.time_restricted || state.window.contains(now));
    if active {
        TargetState::Blocking
    } else {
        TargetState::NotBlocking
    }
}

/// Removes record `id` from the registry after unblocking its URL.
///
/// # Errors
///
/// Returns [`BlockerError::SiteNotFound`] if no such record exists, or
/// whatever the hosts file or the registry reported. The record is kept if
/// the hosts file cannot be updated.
pub fn delete_site<R: SiteRegistry + ?Sized>(
    hosts: &HostsFile,
    registry: &mut R,
    id: i64,
) -> Result<()> {
    let old = registry.get(id)?;
    hosts.unblock(std::slice::from_ref(&old))?;
    registry.delete(id)
}

/// Points record `id` at `url`, unblocking the previous URL if it changes.
///
/// # Errors
///
/// See [`delete_site`].
pub fn update_site<R: SiteRegistry + ?Sized>(
    hosts: &HostsFile,
    registry: &mut R,
    id: i64,
    url: &str,
) -> Result<()> {
    let old = registry.get(id)?;
    if old.url.trim() != url.trim() {
        hosts.unblock(std::slice::from_ref(&old))?;
    }
    registry.update(id, url)
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// State the file was reconciled to.
    pub target: TargetState,
    /// What the pass changed.
    pub change: Change,
}

struct TickState<R> {
    registry: R,
    last_target: Option<TargetState>,
}

struct Inner<R, S> {
    hosts: HostsFile,
    state: S,
    tick: Mutex<TickState<R>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the blocking task finishes or is dropped
/// without running.
struct InFlight<R, S>(Arc<Inner<R, S>>);

impl<R, S> Drop for InFlight<R, S> {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl<R: SiteRegistry, S: StateSource> Inner<R, S> {
    fn lock(&self) -> MutexGuard<'_, TickState<R>> {
        self.tick.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self, now: NaiveTime) -> Result<TickReport> {
        let mut guard = self.lock();

        let state = self.state.snapshot()?;
        let target = decide(&state, now);
        let sites = guard.registry.list()?;
        let change = self.hosts.reconcile(&sites, target)?;

        if guard.last_target != Some(target) {
            tracing::info!(state = %target, sites = sites.len(), "Blocking state changed");
            guard.last_target = Some(target);
        }
        Ok(TickReport { target, change })
    }
}

/// Re-applies the blocking decision on a fixed interval.
///
/// # Example
///
/// ```rust,ignore
/// use hosts_blocker::{Driver, HostsFile, SharedState, SqliteRegistry};
/// use tokio_util::sync::CancellationToken;
///
/// let driver = Driver::new(
///     HostsFile::default(),
///     SqliteRegistry::open("websites.db")?,
///     SharedState::default(),
/// );
/// let cancel = CancellationToken::new();
/// driver.run(cancel.clone()).await;
/// ```
pub struct Driver<R, S> {
    inner: Arc<Inner<R, S>>,
    interval: Duration,
    tick_timeout: Duration,
}

impl<R, S> Driver<R, S>
where
    R: SiteRegistry + Send + 'static,
    S: StateSource + 'static,
{
    /// Creates a driver ticking every 5 seconds.
    pub fn new(hosts: HostsFile, registry: R, state: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                hosts,
                state,
                tick: Mutex::new(TickState {
                    registry,
                    last_target: None,
                }),
                in_flight: AtomicBool::new(false),
            }),
            interval: DEFAULT_INTERVAL,
            tick_timeout: DEFAULT_TICK_TIMEOUT,
        }
    }

    /// Overrides the tick period.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides how long a tick may run before it is reported as hung.
    #[must_use]
    pub const fn with_tick_timeout(mut self, timeout: Duration) -> Self {
        self.tick_timeout = timeout;
        self
    }

    /// Returns the managed hosts file.
    #[must_use]
    pub fn hosts(&self) -> &HostsFile {
        &self.inner.hosts
    }

    /// Runs `f` against the registry between ticks.
    pub fn with_registry<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.inner.lock().registry)
    }

    /// Registers `url` between ticks. The next tick picks it up.
    ///
    /// # Errors
    ///
    /// See [`SiteRegistry::add`].
    pub fn add_site(&self, url: &str) -> Result<i64> {
        self.inner.lock().registry.add(url)
    }

    /// Points record `id` at `url` between ticks. See [`update_site`].
    ///
    /// # Errors
    ///
    /// See [`update_site`].
    pub fn update_site(&self, id: i64, url: &str) -> Result<()> {
        update_site(&self.inner.hosts, &mut self.inner.lock().registry, id, url)
    }

    /// Removes record `id` between ticks. See [`delete_site`].
    ///
    /// # Errors
    ///
    /// See [`delete_site`].
    pub fn delete_site(&self, id: i64) -> Result<()> {
        delete_site(&self.inner.hosts, &mut self.inner.lock().registry, id)
    }

    /// Runs one reconciliation pass for time of day `now`, blocking the
    /// calling thread.
    ///
    /// # Errors
    ///
    /// Returns whatever the state snapshot, the registry, or the hosts file
    /// reported. The file keeps its previous content on error.
    pub fn tick(&self, now: NaiveTime) -> Result<TickReport> {
        self.inner.tick(now)
    }

    /// Runs one pass on the blocking pool at the current local time,
    /// bounded by the tick timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::TickInFlight`] without starting a pass if an
    /// earlier one is still running, [`BlockerError::TickTimedOut`] if the
    /// pass did not finish in time, otherwise see [`tick`](Self::tick).
    pub async fn tick_now(&self) -> Result<TickReport> {
        if self.inner.in_flight.swap(true, Ordering::AcqRel) {
            return Err(BlockerError::TickInFlight);
        }
        let guard = InFlight(Arc::clone(&self.inner));
        let task = tokio::task::spawn_blocking(move || guard.0.tick(Local::now().time()));

        match tokio::time::timeout(self.tick_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(BlockerError::Io(std::io::Error::other(format!(
                "reconciliation task failed: {join}"
            )))),
            Err(_) => Err(BlockerError::TickTimedOut {
                secs: self.tick_timeout.as_secs(),
            }),
        }
    }

    /// Ticks until `cancel` fires, then waits for any pass still running
    /// before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        // `interval` panics on a zero period.
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            path = %self.inner.hosts.path().display(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Reconciliation driver started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.tick_now().await {
                    Ok(report) => tracing::debug!(
                        state = %report.target,
                        added = report.change.added,
                        removed = report.change.removed,
                        "Tick complete"
                    ),
                    Err(BlockerError::TickInFlight) => {
                        tracing::warn!("Previous tick still running, skipping");
                    }
                    Err(e) => tracing::error!(error = %e, "Reconciliation tick failed"),
                },
                () = cancel.cancelled() => break,
            }
        }

        self.drain().await;
        tracing::info!("Reconciliation driver stopped");
    }

    /// Waits until no pass holds the tick lock.
    async fn drain(&self) {
        let inner = Arc::clone(&self.inner);
        if let Err(e) = tokio::task::spawn_blocking(move || drop(inner.lock())).await {
            tracing::warn!(error = %e, "Failed to wait for in-flight tick");
        }
    }
}
