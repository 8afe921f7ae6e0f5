use chrono::NaiveDate;
use rustquarantine::journal::{Journal, RecordAction, JOURNAL_FILE_NAME};
use rustquarantine::progress::ProgressCallback;
use rustquarantine::quarantine::{
    list_batches, BatchId, QuarantineConfig, QuarantineError, QuarantineManager,
};
use rustquarantine::restore::{BatchSelector, RestoreConfig, RestoreManager};
use rustquarantine::scanner::{EmptyFile, WalkerConfig};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    data: PathBuf,
    base: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let data = root.join("data");
    let base = root.join("quarantine");
    fs::create_dir_all(&data).unwrap();
    Fixture {
        _dir: dir,
        data,
        base,
    }
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap();
}

/// Every file under `dir` except the journal, as absolute paths.
fn batch_contents(dir: &Path) -> HashSet<PathBuf> {
    let mut found = HashSet::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if current != dir || path.file_name().unwrap() != JOURNAL_FILE_NAME {
                found.insert(path);
            }
        }
    }
    found
}

#[test]
fn test_moves_only_empty_files() {
    let fx = fixture();
    touch(&fx.data.join("a.txt"));
    touch(&fx.data.join("sub/c.log"));
    fs::write(fx.data.join("b.txt"), "content").unwrap();

    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base));
    let report = manager
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    assert_eq!(report.moved_count(), 2);
    assert!(report.all_succeeded());
    assert!(!fx.data.join("a.txt").exists());
    assert!(!fx.data.join("sub/c.log").exists());
    assert!(fx.data.join("b.txt").exists());

    let batch_root = report.batch_root.unwrap();
    let name = batch_root.file_name().unwrap().to_str().unwrap();
    assert!(name.parse::<BatchId>().is_ok(), "bad batch name {name}");
    assert!(batch_root.join("a.txt").is_file());
    assert!(batch_root.join("c.log").is_file());
}

#[test]
fn test_batch_contents_match_moved_records() {
    let fx = fixture();
    for name in ["one", "two.txt", "x/dup.txt", "y/dup.txt", "y/z/dup.txt"] {
        touch(&fx.data.join(name));
    }

    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base));
    let report = manager
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();
    let batch_root = report.batch_root.unwrap();

    let journal = Journal::load(&batch_root).unwrap();
    assert_eq!(journal.len(), 5);
    let moved: HashSet<PathBuf> = journal
        .with_action(RecordAction::Moved)
        .map(|r| r.moved_to.clone())
        .collect();
    assert_eq!(moved.len(), 5);
    assert_eq!(batch_contents(&batch_root), moved);
}

#[test]
fn test_flattened_names_are_disambiguated() {
    let fx = fixture();
    touch(&fx.data.join("a/x.txt"));
    touch(&fx.data.join("b/x.txt"));
    touch(&fx.data.join("c/x.txt"));

    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base));
    let report = manager
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();
    let batch_root = report.batch_root.unwrap();

    assert!(batch_root.join("x.txt").is_file());
    assert!(batch_root.join("x_1.txt").is_file());
    assert!(batch_root.join("x_2.txt").is_file());

    // Traversal is in name order, so a/ claims the plain name
    let journal = Journal::load(&batch_root).unwrap();
    assert_eq!(journal.records[0].original, fx.data.join("a/x.txt"));
    assert_eq!(journal.records[0].moved_to, batch_root.join("x.txt"));
}

#[test]
fn test_preserve_structure_mirrors_layout() {
    let fx = fixture();
    touch(&fx.data.join("a/x.txt"));
    touch(&fx.data.join("b/deep/x.txt"));

    let config = QuarantineConfig::new(&fx.base).with_preserve_structure(true);
    let report = QuarantineManager::new(config)
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();
    let batch_root = report.batch_root.unwrap();

    assert!(batch_root.join("a/x.txt").is_file());
    assert!(batch_root.join("b/deep/x.txt").is_file());
    assert!(!batch_root.join("x_1.txt").exists());
}

#[test]
fn test_dry_run_changes_nothing() {
    let fx = fixture();
    touch(&fx.data.join("a.txt"));
    touch(&fx.data.join("sub/b.txt"));

    let config = QuarantineConfig::new(&fx.base).with_dry_run(true);
    let report = QuarantineManager::new(config)
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.records.len(), 2);
    assert!(fx.data.join("a.txt").exists());
    assert!(fx.data.join("sub/b.txt").exists());
    assert!(!fx.base.exists());
    assert!(list_batches(&fx.base).unwrap().is_empty());
}

#[test]
fn test_dry_run_reports_same_plan_as_real_run() {
    let fx = fixture();
    touch(&fx.data.join("a/x.txt"));
    touch(&fx.data.join("b/x.txt"));

    let dry = QuarantineManager::new(QuarantineConfig::new(&fx.base).with_dry_run(true))
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();
    let real = QuarantineManager::new(QuarantineConfig::new(&fx.base))
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    let names = |records: &[rustquarantine::journal::FileRecord]| -> Vec<PathBuf> {
        records
            .iter()
            .map(|r| PathBuf::from(r.moved_to.file_name().unwrap()))
            .collect()
    };
    assert_eq!(names(&dry.records), names(&real.records));
}

#[test]
fn test_nothing_to_quarantine_creates_no_batch() {
    let fx = fixture();
    fs::write(fx.data.join("full.txt"), "x").unwrap();

    let report = QuarantineManager::new(QuarantineConfig::new(&fx.base))
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    assert!(report.batch_root.is_none());
    assert!(report.records.is_empty());
    assert!(list_batches(&fx.base).unwrap().is_empty());
}

#[test]
fn test_rescan_skips_existing_batches() {
    let fx = fixture();
    // Base inside the scanned tree
    let base = fx.data.join("q");
    touch(&fx.data.join("first.txt"));

    let manager = QuarantineManager::new(QuarantineConfig::new(&base));
    let first = manager
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();
    let first_root = first.batch_root.unwrap();
    assert!(first_root.join("first.txt").is_file());

    touch(&fx.data.join("second.txt"));
    let second = manager
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    assert_eq!(second.moved_count(), 1);
    assert_eq!(second.records[0].original, fx.data.join("second.txt"));
    assert_ne!(second.batch_root.unwrap(), first_root);
    assert!(first_root.join("first.txt").is_file());
    assert_eq!(Journal::load(&first_root).unwrap().len(), 1);
}

#[test]
fn test_batches_in_same_second_get_suffixes() {
    let fx = fixture();
    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base));

    let mut roots = Vec::new();
    for i in 0..3 {
        touch(&fx.data.join(format!("f{i}")));
        let report = manager
            .quarantine_empty_files(&fx.data, WalkerConfig::default())
            .unwrap();
        roots.push(report.batch_root.unwrap());
    }

    let batches = list_batches(&fx.base).unwrap();
    assert_eq!(batches.len(), 3);
    let unique: HashSet<_> = roots.iter().collect();
    assert_eq!(unique.len(), 3);
    // Listing order is creation order
    let listed: Vec<PathBuf> = batches.into_iter().map(|b| b.root).collect();
    assert_eq!(listed, roots);
}

#[test]
fn test_base_that_is_a_file_is_rejected() {
    let fx = fixture();
    touch(&fx.data.join("a.txt"));
    fs::write(&fx.base, "not a directory").unwrap();

    let result = QuarantineManager::new(QuarantineConfig::new(&fx.base))
        .quarantine_empty_files(&fx.data, WalkerConfig::default());
    assert!(result.is_err());
    assert!(fx.data.join("a.txt").exists());
}

#[test]
fn test_directory_named_like_journal_is_renamed() {
    let fx = fixture();
    touch(&fx.data.join("metadata.json/a.txt"));
    touch(&fx.data.join("metadata_1.json"));

    let config = QuarantineConfig::new(&fx.base).with_preserve_structure(true);
    let report = QuarantineManager::new(config)
        .quarantine_empty_files(&fx.data, WalkerConfig::default())
        .unwrap();

    assert_eq!(report.moved_count(), 2);
    let batch = report.batch_root.unwrap();
    assert!(batch.join(JOURNAL_FILE_NAME).is_file());
    assert!(batch.join("metadata_1.json").is_file());
    assert!(batch.join("metadata_2.json/a.txt").is_file());
    assert_eq!(Journal::load(&batch).unwrap().len(), 2);

    let restored = RestoreManager::new(RestoreConfig::new(&fx.base))
        .restore(&BatchSelector::Latest)
        .unwrap();
    assert_eq!(restored.restored.len(), 2);
    assert!(fx.data.join("metadata.json/a.txt").is_file());
    assert!(fx.data.join("metadata_1.json").is_file());
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
fn test_unwritable_journal_rolls_moves_back() {
    let fx = fixture();
    touch(&fx.data.join("a.txt"));
    touch(&fx.data.join("sub/b.txt"));

    // Occupy the journal's name inside the freshly created batch.
    let base = fx.base.clone();
    let block_journal = OnPhaseStart(move || {
        let batch = list_batches(&base).unwrap().remove(0);
        fs::create_dir(batch.root.join(JOURNAL_FILE_NAME)).unwrap();
    });
    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base))
        .with_progress_callback(Arc::new(block_journal));
    let candidates = manager
        .collect(&fx.data, WalkerConfig::default(), EmptyFile)
        .unwrap();
    let err = manager.run(&candidates.root, candidates.files).unwrap_err();

    match err {
        QuarantineError::JournalWrite {
            records, stranded, ..
        } => {
            assert_eq!(records.len(), 2);
            assert!(records.iter().all(|r| r.action == RecordAction::Moved));
            assert!(stranded.is_empty());
        }
        other => panic!("expected JournalWrite, got {other:?}"),
    }
    assert!(fx.data.join("a.txt").is_file());
    assert!(fx.data.join("sub/b.txt").is_file());
    assert!(list_batches(&fx.base).unwrap().is_empty());
}

#[test]
fn test_batch_is_named_when_created() {
    let fx = fixture();
    touch(&fx.data.join("a.txt"));

    let manager = QuarantineManager::new(QuarantineConfig::new(&fx.base));
    let mut plan = manager
        .plan(&fx.data, vec![rustquarantine::scanner::FileEntry::new(fx.data.join("a.txt"), 0)])
        .unwrap();
    let stale = BatchId::new(
        NaiveDate::from_ymd_opt(2001, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    );
    plan.batch_id = stale;

    let report = manager.execute(plan).unwrap();
    let name = report.batch_root.unwrap();
    let id: BatchId = name.file_name().unwrap().to_str().unwrap().parse().unwrap();
    assert!(id.created > stale.created);
    assert!(fx.base.join(stale.to_string()).symlink_metadata().is_err());
}
