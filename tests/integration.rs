//! Integration tests for `hosts-blocker`.
//!
//! Tests marked `#[ignore]` require root:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use chrono::NaiveTime;
use hosts_blocker::{
    BlockWindow, BlockerError, BlockerState, Driver, HostsFile, SharedState, SiteRecord,
    SiteRegistry, SqliteRegistry, StateFile, TargetState, delete_site, update_site,
};

const SYSTEM_HOSTS: &str = "\
127.0.0.1\tlocalhost
255.255.255.255\tbroadcasthost
::1             localhost
# Added by Docker Desktop
192.168.65.2 host.docker.internal
";

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn hosts_in(dir: &tempfile::TempDir) -> HostsFile {
    let path = dir.path().join("hosts");
    std::fs::write(&path, SYSTEM_HOSTS).unwrap();
    HostsFile::new(path)
}

fn read(hosts: &HostsFile) -> String {
    std::fs::read_to_string(hosts.path()).unwrap()
}

// ---------------------------------------------------------------------------
// Tempdir tests (no root required)
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let backup = dir.path().join("hosts.backup");
    hosts.backup(&backup).unwrap();

    let mut registry = SqliteRegistry::open(dir.path().join("websites.db")).unwrap();
    registry.add("example.com").unwrap();
    registry.add("news.site").unwrap();

    let state = SharedState::default();
    let driver = Driver::new(hosts, registry, state.clone());

    // Disabled: nothing happens.
    let report = driver.tick(at(12, 0)).unwrap();
    assert_eq!(report.target, TargetState::NotBlocking);
    assert!(report.change.is_noop());
    assert_eq!(read(driver.hosts()), SYSTEM_HOSTS);

    // Enabled all day.
    state.set_enabled(true);
    let report = driver.tick(at(20, 0)).unwrap();
    assert_eq!(report.target, TargetState::Blocking);
    assert_eq!(
        read(driver.hosts()),
        format!("{SYSTEM_HOSTS}127.0.0.1 example.com\n127.0.0.1 news.site\n")
    );

    // Restricted to office hours, now in the evening.
    state.set_time_restricted(true);
    state.set_window(BlockWindow::from_hm(9, 0, 17, 0).unwrap());
    let report = driver.tick(at(20, 0)).unwrap();
    assert_eq!(report.target, TargetState::NotBlocking);
    assert_eq!(report.change.removed, 2);
    assert_eq!(read(driver.hosts()), SYSTEM_HOSTS);

    // Back inside the window.
    assert_eq!(driver.tick(at(12, 0)).unwrap().target, TargetState::Blocking);

    // Backup is the pre-run snapshot.
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), SYSTEM_HOSTS);
}

#[test]
fn overnight_schedule_from_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let mut registry = SqliteRegistry::open_in_memory().unwrap();
    registry.add("example.com").unwrap();

    let state_file = StateFile::new(dir.path().join("state.toml"));
    state_file
        .save(&BlockerState {
            enabled: true,
            time_restricted: true,
            window: "22:00-06:00".parse().unwrap(),
        })
        .unwrap();

    let driver = Driver::new(hosts, registry, state_file.clone());

    assert_eq!(driver.tick(at(23, 30)).unwrap().target, TargetState::Blocking);
    assert_eq!(driver.tick(at(22, 0)).unwrap().target, TargetState::NotBlocking);
    assert_eq!(driver.tick(at(5, 0)).unwrap().target, TargetState::Blocking);
    assert_eq!(driver.tick(at(12, 0)).unwrap().target, TargetState::NotBlocking);
    assert_eq!(read(driver.hosts()), SYSTEM_HOSTS);

    // Toggle changed on disk between ticks.
    state_file.modify(|s| s.time_restricted = false).unwrap();
    assert_eq!(driver.tick(at(12, 0)).unwrap().target, TargetState::Blocking);
}

#[test]
fn idempotent_block() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let sites = vec![SiteRecord::new(1, "example.com")];

    hosts.reconcile(&sites, TargetState::Blocking).unwrap();
    hosts.reconcile(&sites, TargetState::Blocking).unwrap();

    let content = read(&hosts);
    assert_eq!(content.matches("example.com").count(), 1);
}

#[test]
fn idempotent_unblock() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let sites = vec![SiteRecord::new(1, "example.com")];

    hosts.reconcile(&sites, TargetState::Blocking).unwrap();
    hosts.reconcile(&sites, TargetState::NotBlocking).unwrap();
    // Second call has nothing left to remove.
    assert!(
        hosts
            .reconcile(&sites, TargetState::NotBlocking)
            .unwrap()
            .is_noop()
    );
    assert_eq!(read(&hosts), SYSTEM_HOSTS);
}

#[test]
fn converges_after_external_edit() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let sites = vec![SiteRecord::new(1, "example.com"), SiteRecord::new(2, "news.site")];

    hosts.reconcile(&sites, TargetState::Blocking).unwrap();

    // Another tool rewrites the file and drops one of our lines.
    let edited = read(&hosts).replace("127.0.0.1 news.site\n", "10.1.1.1 printer.lan\n");
    std::fs::write(hosts.path(), edited).unwrap();

    let change = hosts.reconcile(&sites, TargetState::Blocking).unwrap();
    assert_eq!(change.added, 1);
    let content = read(&hosts);
    assert!(content.contains("10.1.1.1 printer.lan\n"));
    assert_eq!(content.matches("news.site").count(), 1);

    hosts.reconcile(&sites, TargetState::NotBlocking).unwrap();
    assert_eq!(read(&hosts), format!("{SYSTEM_HOSTS}10.1.1.1 printer.lan\n"));
}

#[test]
fn failed_tick_keeps_running_state() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let path = hosts.path().to_path_buf();
    let mut registry = SqliteRegistry::open_in_memory().unwrap();
    registry.add("example.com").unwrap();

    let state = SharedState::default();
    state.set_enabled(true);
    let driver = Driver::new(hosts, registry, state);

    std::fs::remove_file(&path).unwrap();
    let err = driver.tick(at(12, 0)).unwrap_err();
    assert!(matches!(err, BlockerError::FileAccess { .. }));

    // File comes back; the next tick converges.
    std::fs::write(&path, SYSTEM_HOSTS).unwrap();
    assert_eq!(driver.tick(at(12, 0)).unwrap().change.added, 1);
}

#[test]
fn registry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("websites.db");

    let mut registry = SqliteRegistry::open(&db).unwrap();
    let a = registry.add("example.com").unwrap();
    let b = registry.add("news.site").unwrap();
    registry.update(b, "video.site").unwrap();
    registry.close().unwrap();

    let mut registry = SqliteRegistry::open(&db).unwrap();
    assert_eq!(
        registry.list().unwrap(),
        vec![SiteRecord::new(a, "example.com"), SiteRecord::new(b, "video.site")]
    );
    registry.delete(a).unwrap();
    assert!(matches!(
        registry.delete(a),
        Err(BlockerError::SiteNotFound { .. })
    ));
}

#[test]
fn removed_sites_leave_no_lines_behind() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = hosts_in(&dir);
    let mut registry = SqliteRegistry::open(dir.path().join("websites.db")).unwrap();
    let news = registry.add("news.site").unwrap();
    let video = registry.add("video.site").unwrap();

    hosts
        .reconcile(&registry.list().unwrap(), TargetState::Blocking)
        .unwrap();

    // Managed from a separate invocation while blocking is on.
    delete_site(&hosts, &mut registry, news).unwrap();
    update_site(&hosts, &mut registry, video, "chat.site").unwrap();
    assert_eq!(read(&hosts), SYSTEM_HOSTS);

    hosts
        .reconcile(&registry.list().unwrap(), TargetState::Blocking)
        .unwrap();
    assert_eq!(read(&hosts), format!("{SYSTEM_HOSTS}127.0.0.1 chat.site\n"));

    hosts
        .reconcile(&registry.list().unwrap(), TargetState::NotBlocking)
        .unwrap();
    assert_eq!(read(&hosts), SYSTEM_HOSTS);
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[test]
#[ignore = "requires root to replace the system hosts file"]
fn real_block_and_unblock() {
    let hosts = HostsFile::default();
    let original = read(&hosts);
    let sites = vec![SiteRecord::new(1, "hosts-blocker-test.invalid")];

    hosts.reconcile(&sites, TargetState::Blocking).unwrap();
    assert!(read(&hosts).contains("127.0.0.1 hosts-blocker-test.invalid"));

    hosts.reconcile(&sites, TargetState::NotBlocking).unwrap();
    assert_eq!(read(&hosts), original);
}
