use dupescan::config::ExtractStrategy;
use dupescan::duplicates::{DuplicateFinder, FinderConfig, ScanReport};
use dupescan::scanner::WalkerConfig;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn scan(dir: &TempDir, data: &Path, strategy: ExtractStrategy) -> ScanReport {
    let config = FinderConfig::default()
        .with_output_dir(dir.path().join(format!("out-{strategy}")))
        .with_strategy(strategy);
    DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data.to_path_buf()], WalkerConfig::default())
        .unwrap()
}

fn data_dir(dir: &TempDir) -> std::path::PathBuf {
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    data
}

#[test]
fn test_empty_files_are_not_duplicates() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    File::create(data.join("empty1.txt")).unwrap();
    File::create(data.join("empty2.txt")).unwrap();

    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let report = scan(&dir, &data, strategy);
        assert_eq!(report.summary.total_files, 2);
        assert_eq!(report.summary.hashed_files, 0);
        assert!(report.load_groups().unwrap().is_empty());
    }
}

#[test]
fn test_very_small_files() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    File::create(data.join("small1.txt")).unwrap().write_all(b"a").unwrap();
    File::create(data.join("small2.txt")).unwrap().write_all(b"a").unwrap();
    File::create(data.join("small3.txt")).unwrap().write_all(b"b").unwrap();

    let report = scan(&dir, &data, ExtractStrategy::Seek);
    let groups = report.load_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].size, 1);
}

#[test]
fn test_unique_size_is_never_hashed() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    fs::write(data.join("a"), "12").unwrap();
    fs::write(data.join("b"), "123").unwrap();
    fs::write(data.join("c"), "1234").unwrap();

    let report = scan(&dir, &data, ExtractStrategy::Seek);
    assert_eq!(report.summary.candidate_files, 0);
    assert_eq!(report.summary.hashed_files, 0);
    assert!(!report.summary.has_duplicates());
}

#[test]
fn test_files_larger_than_read_chunk() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    let big: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(data.join("big1.bin"), &big).unwrap();
    fs::write(data.join("big2.bin"), &big).unwrap();
    let mut tweaked = big.clone();
    // Differ only in the last byte
    *tweaked.last_mut().unwrap() ^= 0xff;
    fs::write(data.join("big3.bin"), &tweaked).unwrap();

    let mut config = FinderConfig::default().with_output_dir(dir.path().join("out"));
    config.pipeline.read_chunk_size = 4096;
    let report = DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();

    let groups = report.load_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(report.summary.reclaimable_space, 200_000);
}

#[test]
fn test_many_copies_of_one_file() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    for i in 0..50 {
        fs::write(data.join(format!("copy{i:02}")), "identical").unwrap();
    }

    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let report = scan(&dir, &data, strategy);
        let groups = report.load_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 50);
        assert_eq!(report.summary.duplicate_files, 49);
        assert_eq!(report.summary.reclaimable_space, 49 * 9);
    }
}

#[test]
fn test_minimum_hash_width() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);
    fs::write(data.join("a"), "same").unwrap();
    fs::write(data.join("b"), "same").unwrap();
    fs::write(data.join("c"), "diff").unwrap();

    let mut config = FinderConfig::default().with_output_dir(dir.path().join("out"));
    config.pipeline.hash_width = 8;
    let report = DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();
    let groups = report.load_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].hash.len(), 8);
    assert!(report.summary.collision_probability > 0.0);
}

#[test]
fn test_empty_directory() {
    let dir = tempdir().unwrap();
    let data = data_dir(&dir);

    let report = scan(&dir, &data, ExtractStrategy::Sort);
    assert_eq!(report.summary.total_files, 0);
    assert!(report.report_path.exists());
    assert!(report.load_groups().unwrap().is_empty());
}
