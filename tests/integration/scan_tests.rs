use rustquarantine::quarantine::{QuarantineConfig, QuarantineManager};
use rustquarantine::scanner::{EmptyFile, MinSize, ScanError, Walker, WalkerConfig};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn canonical_tempdir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    (dir, root)
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path).unwrap();
}

fn names(root: &Path, config: WalkerConfig) -> Vec<String> {
    Walker::new(root, config, EmptyFile)
        .walk()
        .map(|r| {
            r.unwrap()
                .path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_hidden_entries_are_pruned() {
    let (_dir, root) = canonical_tempdir();
    touch(&root.join("visible.txt"));
    touch(&root.join(".hidden.txt"));
    touch(&root.join(".git/objects/empty"));
    touch(&root.join("sub/.cache/x"));
    touch(&root.join("sub/kept"));

    let found = names(&root, WalkerConfig::new(true, true));
    assert_eq!(found, vec!["sub/kept", "visible.txt"]);

    let all = names(&root, WalkerConfig::new(false, true));
    assert_eq!(all.len(), 5);
}

#[test]
fn test_quarantine_leaves_hidden_files_alone() {
    let (_dir, root) = canonical_tempdir();
    let data = root.join("data");
    touch(&data.join(".keep"));
    touch(&data.join(".config/settings"));
    touch(&data.join("empty.txt"));

    let report = QuarantineManager::new(QuarantineConfig::new(root.join("q")))
        .quarantine_empty_files(&data, WalkerConfig::new(true, true))
        .unwrap();

    assert_eq!(report.moved_count(), 1);
    assert!(data.join(".keep").exists());
    assert!(data.join(".config/settings").exists());
    assert!(!data.join("empty.txt").exists());
}

#[test]
fn test_non_recursive_stays_at_top_level() {
    let (_dir, root) = canonical_tempdir();
    touch(&root.join("top"));
    touch(&root.join("sub/nested"));

    assert_eq!(names(&root, WalkerConfig::new(false, false)), vec!["top"]);
}

#[test]
fn test_traversal_is_name_ordered() {
    let (_dir, root) = canonical_tempdir();
    for name in ["c", "a", "b/z", "b/a"] {
        touch(&root.join(name));
    }
    assert_eq!(
        names(&root, WalkerConfig::default()),
        vec!["a", "b/a", "b/z", "c"]
    );
}

#[test]
fn test_excluded_dirs_are_not_entered() {
    let (_dir, root) = canonical_tempdir();
    touch(&root.join("keep/a"));
    touch(&root.join("skip/b"));

    let config = WalkerConfig::default().with_excluded_dir(root.join("skip"));
    assert_eq!(names(&root, config), vec!["keep/a"]);
}

#[test]
fn test_predicates() {
    let (_dir, root) = canonical_tempdir();
    touch(&root.join("empty"));
    fs::write(root.join("small"), "ab").unwrap();
    fs::write(root.join("large"), vec![b'x'; 2048]).unwrap();

    let sizes: Vec<u64> = Walker::new(&root, WalkerConfig::default(), MinSize(2))
        .walk()
        .map(|r| r.unwrap().size)
        .collect();
    assert_eq!(sizes, vec![2048, 2]);

    let custom = |path: &Path, _size: u64| path.file_name().is_some_and(|n| n == "small");
    let found: Vec<_> = Walker::new(&root, WalkerConfig::default(), custom)
        .walk()
        .map(|r| r.unwrap().path)
        .collect();
    assert_eq!(found, vec![root.join("small")]);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let (_dir, root) = canonical_tempdir();
    let outside = root.join("outside");
    touch(&outside.join("target"));
    let data = root.join("data");
    fs::create_dir_all(&data).unwrap();
    std::os::unix::fs::symlink(&outside, data.join("linked_dir")).unwrap();
    std::os::unix::fs::symlink(outside.join("target"), data.join("linked_file")).unwrap();

    assert!(names(&data, WalkerConfig::default()).is_empty());
}

#[test]
fn test_invalid_roots() {
    let (_dir, root) = canonical_tempdir();
    let missing = Walker::new(&root.join("nope"), WalkerConfig::default(), EmptyFile);
    assert!(matches!(missing.validate_root(), Err(ScanError::NotFound(_))));

    touch(&root.join("file"));
    let file = Walker::new(&root.join("file"), WalkerConfig::default(), EmptyFile);
    assert!(matches!(
        file.validate_root(),
        Err(ScanError::NotADirectory(_))
    ));
}

#[test]
fn test_shutdown_stops_walk() {
    let (_dir, root) = canonical_tempdir();
    for i in 0..10 {
        touch(&root.join(format!("f{i}")));
    }
    let flag = Arc::new(AtomicBool::new(true));
    let walker = Walker::new(&root, WalkerConfig::default(), EmptyFile).with_shutdown_flag(flag);
    assert_eq!(walker.walk().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_reported_and_walk_continues() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, root) = canonical_tempdir();
    touch(&root.join("a.txt"));
    touch(&root.join("locked/inner.txt"));
    touch(&root.join("z/b.txt"));
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read the directory anyway.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let results: Vec<Result<_, _>> = Walker::new(&root, WalkerConfig::new(true, true), EmptyFile)
        .walk()
        .collect();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let errors: Vec<&ScanError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ScanError::PermissionDenied(p) if p == &locked));

    let found: Vec<PathBuf> = results
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.path)
        .collect();
    assert_eq!(found, vec![root.join("a.txt"), root.join("z/b.txt")]);
}
