use rustquarantine::journal::{Journal, JournalError, JOURNAL_FILE_NAME};
use rustquarantine::quarantine::{summarize_batches, QuarantineConfig, QuarantineManager};
use rustquarantine::restore::{BatchSelector, RestoreConfig, RestoreError, RestoreManager};
use rustquarantine::scanner::WalkerConfig;
use std::fs::{self, File};
use std::path::PathBuf;
use tempfile::TempDir;

fn quarantined_batch(dir: &TempDir, names: &[&str]) -> (PathBuf, PathBuf, PathBuf) {
    let root = fs::canonicalize(dir.path()).unwrap();
    let data = root.join("data");
    let base = root.join("q");
    fs::create_dir_all(&data).unwrap();
    for name in names {
        File::create(data.join(name)).unwrap();
    }
    let batch = QuarantineManager::new(QuarantineConfig::new(&base))
        .quarantine_empty_files(&data, WalkerConfig::default())
        .unwrap()
        .batch_root
        .unwrap();
    (data, base, batch)
}

#[test]
fn test_journal_file_format() {
    let dir = TempDir::new().unwrap();
    let (data, _base, batch) = quarantined_batch(&dir, &["a.txt"]);

    let raw = fs::read_to_string(batch.join(JOURNAL_FILE_NAME)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let records = value.as_array().expect("journal is a JSON array");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record["action"], "moved");
    assert_eq!(record["size"], 0);
    assert_eq!(
        record["original"].as_str().unwrap(),
        data.join("a.txt").to_str().unwrap()
    );
    assert_eq!(
        record["moved_to"].as_str().unwrap(),
        batch.join("a.txt").to_str().unwrap()
    );
    let time = record["time"].as_str().unwrap();
    assert!(
        chrono::NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S").is_ok(),
        "unexpected time format {time}"
    );
    assert!(record.get("restored_to").is_none());
    assert!(record.get("error").is_none());
}

#[test]
fn test_restore_appends_without_rewriting_moves() {
    let dir = TempDir::new().unwrap();
    let (_data, base, batch) = quarantined_batch(&dir, &["a.txt", "b.txt"]);
    let before = Journal::load(&batch).unwrap();

    RestoreManager::new(RestoreConfig::new(&base))
        .restore(&BatchSelector::Latest)
        .unwrap();

    let after = Journal::load(&batch).unwrap();
    assert_eq!(after.len(), 4);
    assert_eq!(&after.records[..2], &before.records[..]);
}

#[test]
fn test_corrupt_journal_blocks_restore() {
    let dir = TempDir::new().unwrap();
    let (data, base, batch) = quarantined_batch(&dir, &["a.txt"]);
    fs::write(batch.join(JOURNAL_FILE_NAME), "{ not json").unwrap();

    let err = RestoreManager::new(RestoreConfig::new(&base))
        .restore(&BatchSelector::Latest)
        .unwrap_err();

    assert!(matches!(
        err,
        RestoreError::Journal(JournalError::Corrupt { .. })
    ));
    assert!(batch.join("a.txt").is_file());
    assert!(!data.join("a.txt").exists());
}

#[test]
fn test_missing_journal_blocks_restore() {
    let dir = TempDir::new().unwrap();
    let (_data, base, batch) = quarantined_batch(&dir, &["a.txt"]);
    fs::remove_file(batch.join(JOURNAL_FILE_NAME)).unwrap();

    let err = RestoreManager::new(RestoreConfig::new(&base))
        .restore(&BatchSelector::Latest)
        .unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Journal(JournalError::NotFound(_))
    ));
}

#[test]
fn test_listing_marks_unreadable_journal() {
    let dir = TempDir::new().unwrap();
    let (data, base, first) = quarantined_batch(&dir, &["a.txt", "b.txt"]);
    File::create(data.join("c.txt")).unwrap();
    let second = QuarantineManager::new(QuarantineConfig::new(&base))
        .quarantine_empty_files(&data, WalkerConfig::default())
        .unwrap()
        .batch_root
        .unwrap();
    fs::write(second.join(JOURNAL_FILE_NAME), "[").unwrap();

    let summaries = summarize_batches(&base).unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].batch.root, first);
    assert_eq!(summaries[0].records, Some(2));
    assert_eq!(summaries[1].records, None);
}
