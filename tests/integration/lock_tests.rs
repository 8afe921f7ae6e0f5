use rustquarantine::quarantine::{QuarantineConfig, QuarantineManager};
use rustquarantine::scanner::WalkerConfig;
use rustquarantine::scheduler::{LockError, RunGuard, Scheduler, LOCK_FILE_NAME};
use rustquarantine::signal::ShutdownHandler;
use std::fs::{self, File};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_scheduled_run_skipped_while_manual_run_holds_lock() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("q");
    let manual = RunGuard::try_acquire(&base).unwrap();

    let scheduler = Scheduler::new(Duration::ZERO, &base, ShutdownHandler::new()).with_max_ticks(2);
    let ran = scheduler.run(|| -> anyhow::Result<()> { panic!("job must not run while locked") });
    assert_eq!(ran, 0);

    drop(manual);
    let ran = scheduler.run(|| -> anyhow::Result<()> { Ok(()) });
    assert_eq!(ran, 2);
    assert!(!base.join(LOCK_FILE_NAME).exists());
}

#[test]
fn test_second_guard_is_refused() {
    let dir = TempDir::new().unwrap();
    let _first = RunGuard::try_acquire(dir.path()).unwrap();
    match RunGuard::try_acquire(dir.path()) {
        Err(LockError::Locked(path)) => assert_eq!(path, dir.path().join(LOCK_FILE_NAME)),
        other => panic!("expected Locked, got {other:?}"),
    }
}

#[test]
fn test_stale_lock_blocks_until_removed() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(LOCK_FILE_NAME), "12345\n").unwrap();

    assert!(matches!(
        RunGuard::try_acquire(dir.path()),
        Err(LockError::Locked(_))
    ));
    fs::remove_file(dir.path().join(LOCK_FILE_NAME)).unwrap();
    assert!(RunGuard::try_acquire(dir.path()).is_ok());
}

#[test]
fn test_lock_file_is_never_quarantined() {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    File::create(root.join("empty.txt")).unwrap();

    // Base is the scanned directory itself, with hidden files included
    let guard = RunGuard::try_acquire(&root).unwrap();
    let report = QuarantineManager::new(QuarantineConfig::new(&root))
        .quarantine_empty_files(&root, WalkerConfig::new(false, true))
        .unwrap();
    drop(guard);

    assert_eq!(report.moved_count(), 1);
    assert_eq!(report.records[0].original, root.join("empty.txt"));
}

#[test]
fn test_shutdown_ends_schedule() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownHandler::new();
    let scheduler = Scheduler::new(Duration::from_secs(3600), dir.path(), shutdown.clone());

    let mut runs = 0;
    let ran = scheduler.run(|| -> anyhow::Result<()> {
        runs += 1;
        shutdown.request_shutdown();
        Ok(())
    });
    assert_eq!(ran, 1);
    assert_eq!(runs, 1);
}
