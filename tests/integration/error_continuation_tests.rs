use dupescan::config::ExtractStrategy;
use dupescan::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupescan::error::ExitCode;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn finder(dir: &TempDir, strategy: ExtractStrategy) -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_output_dir(dir.path().join("out"))
            .with_strategy(strategy),
    )
}

fn file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn path_list(paths: &[PathBuf]) -> Cursor<String> {
    let mut list = String::new();
    for p in paths {
        list.push_str(&p.to_string_lossy());
        list.push('\n');
    }
    Cursor::new(list)
}

#[test]
fn test_missing_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let a = file(dir.path(), "a", "same");
    let b = file(dir.path(), "b", "same");
    let gone = dir.path().join("gone");

    let report = finder(&dir, ExtractStrategy::Seek)
        .find_duplicates_from_path_list(path_list(&[a, gone, b]))
        .unwrap();

    assert_eq!(report.summary.input_paths, 3);
    assert_eq!(report.summary.total_files, 2);
    assert_eq!(report.summary.skipped_files, 1);
    assert_eq!(report.summary.duplicate_groups, 1);
    assert_eq!(ExitCode::for_summary(&report.summary), ExitCode::PartialSuccess);
}

#[test]
fn test_directories_and_blank_lines_in_path_list() {
    let dir = TempDir::new().unwrap();
    let a = file(dir.path(), "a", "xyz");
    let b = file(dir.path(), "b", "xyz");
    let list = format!(
        "{}\n\n{}\r\n{}\n",
        a.display(),
        dir.path().display(),
        b.display()
    );

    let report = finder(&dir, ExtractStrategy::Sort)
        .find_duplicates_from_path_list(Cursor::new(list))
        .unwrap();

    assert_eq!(report.summary.input_paths, 3);
    assert_eq!(report.summary.non_regular_files, 1);
    assert_eq!(report.summary.skipped_files, 0);
    assert_eq!(report.summary.duplicate_groups, 1);
    assert_eq!(ExitCode::for_summary(&report.summary), ExitCode::Success);
}

#[test]
fn test_same_size_different_content() {
    let dir = TempDir::new().unwrap();
    let a = file(dir.path(), "a", "aaaa");
    let b = file(dir.path(), "b", "bbbb");

    let report = finder(&dir, ExtractStrategy::Seek)
        .find_duplicates_from_path_list(path_list(&[a, b]))
        .unwrap();

    assert_eq!(report.summary.candidate_files, 2);
    assert_eq!(report.summary.hashed_files, 2);
    assert!(!report.summary.has_duplicates());
    assert_eq!(ExitCode::for_summary(&report.summary), ExitCode::NoDuplicates);
}

#[test]
fn test_empty_path_list() {
    let dir = TempDir::new().unwrap();
    let report = finder(&dir, ExtractStrategy::Sort)
        .find_duplicates_from_path_list(Cursor::new(String::new()))
        .unwrap();
    assert_eq!(report.summary.input_paths, 0);
    assert!(report.load_groups().unwrap().is_empty());
}

#[test]
fn test_shutdown_returns_interrupted() {
    let dir = TempDir::new().unwrap();
    let a = file(dir.path(), "a", "same");
    let b = file(dir.path(), "b", "same");

    let config = FinderConfig::default()
        .with_output_dir(dir.path().join("out"))
        .with_shutdown_flag(Arc::new(AtomicBool::new(true)));
    let err = DuplicateFinder::new(config)
        .find_duplicates_from_path_list(path_list(&[a, b]))
        .unwrap_err();

    assert!(matches!(err, FinderError::Interrupted));
    assert_eq!(
        ExitCode::for_error(&anyhow::Error::new(err)),
        ExitCode::Interrupted
    );
}

#[test]
fn test_invalid_pipeline_config_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = FinderConfig::default().with_output_dir(dir.path().join("out"));
    config.pipeline.hash_width = 100;

    let err = DuplicateFinder::new(config)
        .find_duplicates_from_path_list(Cursor::new(String::new()))
        .unwrap_err();
    assert!(matches!(err, FinderError::Config(_)));
}
