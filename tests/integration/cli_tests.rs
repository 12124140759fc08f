use clap::Parser;
use dupescan::cli::Cli;
use dupescan::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let cli = Cli::try_parse_from(args).unwrap();
    dupescan::run_app(cli)
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("nested")).unwrap();
    fs::write(data.join("one.txt"), "duplicate payload").unwrap();
    fs::write(data.join("nested/two.txt"), "duplicate payload").unwrap();
    fs::write(data.join("three.txt"), "unique").unwrap();
    dir
}

#[test]
fn test_scan_dir_lists_paths_only() {
    let dir = tree();
    let out = dir.path().join("out");
    let code = run(&[
        "dupescan",
        "-q",
        "scan-dir",
        &arg(&dir.path().join("data")),
        "--output-dir",
        &arg(&out),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(fs::read_to_string(out.join("paths.txt")).unwrap().lines().count(), 3);
    assert!(!out.join("sizes.txt").exists());
}

#[test]
fn test_scan_dir_duplicates_seek() {
    let dir = tree();
    let out = dir.path().join("out");
    let code = run(&[
        "dupescan",
        "-q",
        "sd",
        &arg(&dir.path().join("data")),
        "-d",
        "--strategy",
        "seek",
        "--output-dir",
        &arg(&out),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let report = fs::read_to_string(out.join("duplicates-formatted.txt")).unwrap();
    let lines: Vec<_> = report.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with(" 17"));
    assert!(lines[1].starts_with("  "));
}

#[test]
fn test_scan_dir_sort_json_and_discard() {
    let dir = tree();
    let out = dir.path().join("out");
    let code = run(&[
        "dupescan",
        "-q",
        "sd",
        &arg(&dir.path().join("data")),
        "-d",
        "--strategy",
        "sort",
        "--sort-chunk-lines",
        "1",
        "--max-in-flight",
        "2",
        "--output",
        "json",
        "--discard-intermediate",
        "--output-dir",
        &arg(&out),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(out.join("duplicates-sorted.txt").exists());
    assert!(!out.join("hashes.txt").exists());
    assert!(out.join("paths.txt").exists());
}

#[test]
fn test_paths_from_file() {
    let dir = tree();
    let data = dir.path().join("data");
    let list = dir.path().join("list.txt");
    fs::write(
        &list,
        format!("{}\n{}\n", data.join("one.txt").display(), data.join("three.txt").display()),
    )
    .unwrap();

    let code = run(&[
        "dupescan",
        "-q",
        "sd",
        "--paths-from",
        &arg(&list),
        "--strategy",
        "seek",
        "--output-dir",
        &arg(&dir.path().join("out")),
    ])
    .unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_missing_root_is_general_error() {
    let dir = TempDir::new().unwrap();
    let err = run(&[
        "dupescan",
        "-q",
        "sd",
        &arg(&dir.path().join("missing")),
        "-d",
        "--output-dir",
        &arg(&dir.path().join("out")),
    ])
    .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_invalid_override_is_rejected() {
    let dir = tree();
    let err = run(&[
        "dupescan",
        "-q",
        "sd",
        &arg(&dir.path().join("data")),
        "--io-threads",
        "0",
        "--output-dir",
        &arg(&dir.path().join("out")),
    ])
    .unwrap_err();
    assert!(format!("{err:#}").contains("io_threads"));
}
