use dupescan::config::ExtractStrategy;
use dupescan::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, ReportLayout};
use dupescan::progress::{phase, ProgressCallback};
use dupescan::scanner::WalkerConfig;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Build a tree with `groups` duplicate sets of `copies` files each, plus
/// `singles` files whose size is shared but whose content is unique.
fn build_tree(root: &Path, groups: usize, copies: usize, singles: usize) {
    for g in 0..groups {
        let dir = root.join(format!("g{g}"));
        fs::create_dir_all(&dir).unwrap();
        // Sizes repeat across groups so hashing, not size, separates them
        let content = format!("{:0width$}", g, width = 8 + g % 3);
        for c in 0..copies {
            fs::write(dir.join(format!("copy{c}.dat")), &content).unwrap();
        }
    }
    let singles_dir = root.join("singles");
    fs::create_dir_all(&singles_dir).unwrap();
    for s in 0..singles {
        fs::write(singles_dir.join(format!("s{s}")), format!("u{:07}", s + 1_000)).unwrap();
    }
}

fn finder(out: &Path, strategy: ExtractStrategy) -> DuplicateFinder {
    DuplicateFinder::new(
        FinderConfig::default()
            .with_output_dir(out.to_path_buf())
            .with_strategy(strategy),
    )
}

/// Groups as sets of member paths, independent of report order.
fn group_sets(groups: &[DuplicateGroup]) -> BTreeSet<(u64, String, BTreeSet<PathBuf>)> {
    groups
        .iter()
        .map(|g| (g.size, g.hash.clone(), g.members.iter().cloned().collect()))
        .collect()
}

#[test]
fn test_seek_and_sort_agree() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 12, 3, 10);

    let seek = finder(&dir.path().join("seek"), ExtractStrategy::Seek)
        .find_duplicates_in_paths(&[data.clone()], WalkerConfig::default())
        .unwrap();
    let sort = finder(&dir.path().join("sort"), ExtractStrategy::Sort)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();

    assert_eq!(seek.layout, ReportLayout::Grouped);
    assert_eq!(sort.layout, ReportLayout::Sorted);
    assert_eq!(seek.summary.duplicate_groups, 12);
    assert_eq!(seek.summary.duplicate_files, 24);
    assert_eq!(sort.summary.duplicate_groups, 12);

    let seek_groups = seek.load_groups().unwrap();
    let sort_groups = sort.load_groups().unwrap();
    assert_eq!(seek_groups.len(), 12);
    assert_eq!(group_sets(&seek_groups), group_sets(&sort_groups));
    for group in &seek_groups {
        assert_eq!(group.len(), 3);
    }

    let streamed: Vec<DuplicateGroup> = sort.groups().unwrap().map(Result::unwrap).collect();
    assert_eq!(streamed, sort_groups);
}

#[test]
fn test_report_order_is_size_descending() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 9, 2, 0);

    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let report = finder(&dir.path().join(strategy.to_string()), strategy)
            .find_duplicates_in_paths(&[data.clone()], WalkerConfig::default())
            .unwrap();
        let groups = report.load_groups().unwrap();
        let keys: Vec<_> = groups.iter().map(|g| (g.size, g.hash.clone())).collect();
        let mut expected = keys.clone();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        assert_eq!(keys, expected, "strategy {strategy}");
    }
}

#[test]
fn test_sorted_report_is_fully_ordered_with_small_chunks() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 10, 4, 5);

    let mut config = FinderConfig::default()
        .with_output_dir(dir.path().join("out"))
        .with_strategy(ExtractStrategy::Sort);
    config.pipeline.sort_chunk_lines = 3;
    let report = DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();

    let text = fs::read_to_string(&report.report_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 40);

    let parsed: Vec<(u64, &str, &str)> = lines
        .iter()
        .map(|l| {
            let mut parts = l.splitn(3, ' ');
            let hash = parts.next().unwrap();
            let size = parts.next().unwrap().parse().unwrap();
            (size, hash, parts.next().unwrap())
        })
        .collect();
    for pair in parsed.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let ordered = b.0 < a.0 || (b.0 == a.0 && (a.1, a.2) <= (b.1, b.2));
        assert!(ordered, "{a:?} before {b:?}");
    }
    // Scratch chunks are merged away
    let leftover = fs::read_dir(report.output_dir.join("chunks")).unwrap().count();
    assert_eq!(leftover, 0);
}

#[test]
fn test_tight_in_flight_ceiling() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 20, 2, 20);

    let config = FinderConfig::default()
        .with_output_dir(dir.path().join("out"))
        .with_max_in_flight(1)
        .with_io_threads(4);
    let report = DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();

    assert_eq!(report.summary.peak_in_flight, 1);
    assert_eq!(report.summary.hashed_files, 60);
    assert_eq!(report.summary.duplicate_groups, 20);
}

#[test]
fn test_small_write_queue_still_completes() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 15, 3, 0);

    let mut config = FinderConfig::default().with_output_dir(dir.path().join("out"));
    config.pipeline.write_queue_capacity = 1;
    let report = DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();
    assert_eq!(report.summary.duplicate_groups, 15);
    assert_eq!(report.summary.duplicate_files, 30);
}

#[test]
fn test_no_duplicates() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 0, 0, 8);

    let report = finder(&dir.path().join("out"), ExtractStrategy::Seek)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();
    assert_eq!(report.summary.candidate_files, 8);
    assert_eq!(report.summary.hashed_files, 8);
    assert!(!report.summary.has_duplicates());
    assert!(report.report_path.exists());
    assert_eq!(fs::read_to_string(&report.report_path).unwrap(), "");
}

#[test]
fn test_rerun_replaces_previous_output() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 3, 2, 0);
    let out = dir.path().join("out");

    let first = finder(&out, ExtractStrategy::Seek)
        .find_duplicates_in_paths(&[data.clone()], WalkerConfig::default())
        .unwrap();
    assert_eq!(first.summary.duplicate_groups, 3);

    fs::remove_dir_all(data.join("g0")).unwrap();
    let second = finder(&out, ExtractStrategy::Seek)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();
    assert_eq!(second.summary.duplicate_groups, 2);
    assert_eq!(second.load_groups().unwrap().len(), 2);
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_phase_start(&self, phase: &str, _total: u64) {
        self.events.lock().unwrap().push(format!("start:{phase}"));
    }

    fn on_progress(&self, _phase: &str, _current: u64) {}

    fn on_phase_end(&self, phase: &str) {
        self.events.lock().unwrap().push(format!("end:{phase}"));
    }
}

#[test]
fn test_progress_phases_in_order() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    build_tree(&data, 2, 2, 0);

    let progress = Arc::new(RecordingProgress::default());
    let config = FinderConfig::default()
        .with_output_dir(dir.path().join("out"))
        .with_strategy(ExtractStrategy::Sort)
        .with_progress_callback(progress.clone());
    DuplicateFinder::new(config)
        .find_duplicates_in_paths(&[data], WalkerConfig::default())
        .unwrap();

    let events = progress.events.lock().unwrap();
    let starts: Vec<_> = events
        .iter()
        .filter_map(|e| e.strip_prefix("start:"))
        .collect();
    assert_eq!(
        starts,
        vec![phase::WALK, phase::CLASSIFY, phase::HASH, phase::SORT]
    );
    assert_eq!(events.len(), 8);
}
