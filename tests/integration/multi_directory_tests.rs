use dupescan::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupescan::scanner::WalkerConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn finder(dir: &TempDir) -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_output_dir(dir.path().join("out")))
}

#[test]
fn test_duplicates_across_roots() {
    let dir = TempDir::new().unwrap();
    let photos = dir.path().join("photos");
    let backup = dir.path().join("backup");
    write(&photos.join("2024/img.jpg"), "jpeg bytes");
    write(&backup.join("old/img-copy.jpg"), "jpeg bytes");
    write(&backup.join("notes.txt"), "other text");

    let report = finder(&dir)
        .find_duplicates_in_paths(&[photos, backup], WalkerConfig::default())
        .unwrap();

    assert_eq!(report.summary.total_files, 3);
    assert_eq!(report.summary.duplicate_groups, 1);
    let groups = report.load_groups().unwrap();
    let names: Vec<_> = groups[0]
        .members
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"img.jpg".to_string()));
    assert!(names.contains(&"img-copy.jpg".to_string()));
}

#[test]
fn test_overlapping_roots_do_not_self_match() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("inner/only.bin"), "single file");
    write(&data.join("other.bin"), "single file!");

    let report = finder(&dir)
        .find_duplicates_in_paths(&[data.clone(), data.join("inner")], WalkerConfig::default())
        .unwrap();

    assert_eq!(report.summary.total_files, 2);
    assert!(!report.summary.has_duplicates());
}

#[test]
fn test_one_bad_root_fails_before_output() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good");
    write(&good.join("a"), "a");

    let result = finder(&dir)
        .find_duplicates_in_paths(&[good, dir.path().join("missing")], WalkerConfig::default());

    assert!(matches!(result, Err(FinderError::PathNotFound(_))));
    assert!(!dir.path().join("out").join("paths.txt").exists());
}

#[test]
fn test_list_paths_counts_all_roots() {
    let dir = TempDir::new().unwrap();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    write(&one.join("a"), "12345");
    write(&two.join("b"), "123");
    write(&two.join("deep/er/c"), "1");

    let listing = finder(&dir)
        .list_paths(&[one, two], WalkerConfig::default())
        .unwrap();
    assert_eq!(listing.stats.files, 3);
    assert_eq!(listing.stats.total_size, 9);
    assert_eq!(
        fs::read_to_string(&listing.paths_file).unwrap().lines().count(),
        3
    );
}
