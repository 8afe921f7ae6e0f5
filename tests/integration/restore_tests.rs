use rustquarantine::journal::{Journal, RecordAction, JOURNAL_FILE_NAME};
use rustquarantine::progress::ProgressCallback;
use rustquarantine::quarantine::{QuarantineConfig, QuarantineManager};
use rustquarantine::restore::{BatchSelector, RestoreConfig, RestoreError, RestoreManager};
use rustquarantine::scanner::WalkerConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    data: PathBuf,
    base: PathBuf,
}

fn fixture(files: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let data = root.join("data");
    let base = root.join("quarantine");
    for name in files {
        let path = data.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }
    fs::create_dir_all(&data).unwrap();
    Fixture {
        _dir: dir,
        data,
        base,
    }
}

fn quarantine(fx: &Fixture, preserve: bool) -> PathBuf {
    let config = QuarantineConfig::new(&fx.base).with_preserve_structure(preserve);
    QuarantineManager::new(config)
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap()
        .batch_root
        .unwrap()
}

fn restorer(base: &Path) -> RestoreManager {
    RestoreManager::new(RestoreConfig::new(base))
}

#[test]
fn test_two_empty_files_round_trip() {
    let fx = fixture(&["a.txt", "b.txt"]);
    let batch_root = quarantine(&fx, false);

    assert!(batch_root.join("a.txt").is_file());
    assert!(batch_root.join("b.txt").is_file());
    let journal = Journal::load(&batch_root).unwrap();
    assert_eq!(journal.with_action(RecordAction::Moved).count(), 2);

    let report = restorer(&fx.base).restore(&BatchSelector::Latest).unwrap();
    assert_eq!(report.restored.len(), 2);
    assert!(report.all_succeeded());

    for name in ["a.txt", "b.txt"] {
        let path = fx.data.join(name);
        assert!(path.is_file(), "{name} not restored");
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    let journal = Journal::load(&batch_root).unwrap();
    assert_eq!(journal.counts(), (2, 2, 0));
}

#[test]
fn test_round_trip_with_preserved_structure() {
    let fx = fixture(&["top.txt", "x/y/deep.txt", "x/flat.txt"]);
    quarantine(&fx, true);
    for name in ["top.txt", "x/y/deep.txt", "x/flat.txt"] {
        assert!(!fx.data.join(name).exists());
    }

    // Parent directories are gone too and must be recreated
    fs::remove_dir_all(fx.data.join("x")).unwrap();
    restorer(&fx.base).restore(&BatchSelector::Latest).unwrap();

    for name in ["top.txt", "x/y/deep.txt", "x/flat.txt"] {
        assert!(fx.data.join(name).is_file(), "{name} not restored");
    }
}

#[test]
fn test_second_restore_is_noop() {
    let fx = fixture(&["a.txt", "b.txt"]);
    let batch_root = quarantine(&fx, false);

    let manager = restorer(&fx.base);
    manager.restore(&BatchSelector::Latest).unwrap();
    let again = manager.restore(&BatchSelector::Latest).unwrap();

    assert!(again.is_noop());
    assert_eq!(again.already_restored, 2);
    assert!(again.restored.is_empty());
    assert_eq!(Journal::load(&batch_root).unwrap().len(), 4);
}

#[test]
fn test_occupied_original_gets_sibling() {
    let fx = fixture(&["a.txt"]);
    quarantine(&fx, false);
    fs::write(fx.data.join("a.txt"), "newer content").unwrap();

    let report = restorer(&fx.base).restore(&BatchSelector::Latest).unwrap();

    assert_eq!(report.restored.len(), 1);
    let restored = &report.restored[0];
    assert!(restored.deviated());
    assert_eq!(restored.restored_to, fx.data.join("a_1.txt"));
    assert_eq!(fs::read_to_string(fx.data.join("a.txt")).unwrap(), "newer content");
    assert_eq!(fs::metadata(fx.data.join("a_1.txt")).unwrap().len(), 0);

    let journal = Journal::load(&report.batch.root).unwrap();
    let record = journal.with_action(RecordAction::Restored).next().unwrap();
    assert_eq!(record.restored_to.as_deref(), Some(fx.data.join("a_1.txt").as_path()));
}

#[test]
fn test_missing_quarantined_file_is_skipped() {
    let fx = fixture(&["a.txt", "b.txt"]);
    let batch_root = quarantine(&fx, false);
    fs::remove_file(batch_root.join("a.txt")).unwrap();

    let report = restorer(&fx.base).restore(&BatchSelector::Latest).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].original, fx.data.join("a.txt"));
    assert_eq!(report.restored.len(), 1);
    assert!(fx.data.join("b.txt").is_file());
    assert!(!fx.data.join("a.txt").exists());
}

#[test]
fn test_dry_run_restore_moves_nothing() {
    let fx = fixture(&["a.txt"]);
    let batch_root = quarantine(&fx, false);

    let manager = RestoreManager::new(RestoreConfig::new(&fx.base).with_dry_run(true));
    let report = manager.restore(&BatchSelector::Latest).unwrap();

    assert!(report.dry_run);
    assert_eq!(report.restored.len(), 1);
    assert!(batch_root.join("a.txt").is_file());
    assert!(!fx.data.join("a.txt").exists());
    assert_eq!(Journal::load(&batch_root).unwrap().len(), 1);
}

#[test]
fn test_explicit_batch_by_name_and_path() {
    let fx = fixture(&["first.txt"]);
    let first = quarantine(&fx, false);
    File::create(fx.data.join("second.txt")).unwrap();
    let second = quarantine(&fx, false);

    let manager = restorer(&fx.base);
    let name = PathBuf::from(first.file_name().unwrap());
    assert_eq!(manager.resolve(&BatchSelector::Explicit(name)).unwrap().root, first);
    assert_eq!(
        manager.resolve(&BatchSelector::Explicit(second.clone())).unwrap().root,
        second
    );
    assert_eq!(manager.resolve(&BatchSelector::Latest).unwrap().root, second);

    let report = manager
        .restore(&BatchSelector::Explicit(first.clone()))
        .unwrap();
    assert_eq!(report.restored.len(), 1);
    assert!(fx.data.join("first.txt").is_file());
    assert!(!fx.data.join("second.txt").exists());
}

#[test]
fn test_no_batches_is_error() {
    let fx = fixture(&[]);
    let err = restorer(&fx.base)
        .restore(&BatchSelector::Latest)
        .unwrap_err();
    assert!(matches!(err, RestoreError::NoBatches(_)));
}

#[test]
fn test_unknown_batch_is_error() {
    let fx = fixture(&["a.txt"]);
    quarantine(&fx, false);
    let err = restorer(&fx.base)
        .restore(&BatchSelector::Explicit(PathBuf::from("quarantine-19990101-000000")))
        .unwrap_err();
    assert!(matches!(err, RestoreError::BatchNotFound(_)));
}

/// Runs `f` when a phase starts.
struct OnPhaseStart<F>(F);

impl<F: Fn() + Send + Sync> ProgressCallback for OnPhaseStart<F> {
    fn on_phase_start(&self, _phase: &str, _total: usize) {
        (self.0)();
    }
    fn on_progress(&self, _current: usize, _path: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_unrecordable_restore_is_undone() {
    let fx = fixture(&["a.txt", "b.txt"]);
    let batch_root = quarantine(&fx, false);
    let journal_path = batch_root.join(JOURNAL_FILE_NAME);
    let saved = fs::read_to_string(&journal_path).unwrap();

    // Replace the journal with a directory once the restore has read it.
    let path = journal_path.clone();
    let break_journal = OnPhaseStart(move || {
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
    });
    let err = restorer(&fx.base)
        .with_progress_callback(Arc::new(break_journal))
        .restore(&BatchSelector::Latest)
        .unwrap_err();

    match err {
        RestoreError::JournalWrite {
            restored, stranded, ..
        } => {
            assert_eq!(restored.len(), 2);
            assert!(stranded.is_empty());
        }
        other => panic!("expected JournalWrite, got {other:?}"),
    }
    assert!(!fx.data.join("a.txt").exists());
    assert!(batch_root.join("a.txt").is_file());
    assert!(batch_root.join("b.txt").is_file());

    // With the journal back, nothing is reported missing.
    fs::remove_dir(&journal_path).unwrap();
    fs::write(&journal_path, saved).unwrap();
    let report = restorer(&fx.base).restore(&BatchSelector::Latest).unwrap();
    assert_eq!(report.restored.len(), 2);
    assert!(report.skipped.is_empty());
    assert!(fx.data.join("b.txt").is_file());
}
