use dupescan::config::ExtractStrategy;
use dupescan::duplicates::{DuplicateFinder, FinderConfig};
use dupescan::scanner::WalkerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(dir: &TempDir, data: PathBuf, walker: WalkerConfig, strategy: ExtractStrategy) -> Vec<Vec<String>> {
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_output_dir(dir.path().join(format!("out-{strategy}")))
            .with_strategy(strategy),
    );
    let report = finder.find_duplicates_in_paths(&[data], walker).unwrap();
    report
        .load_groups()
        .unwrap()
        .into_iter()
        .map(|g| {
            let mut names: Vec<_> = g
                .members
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        })
        .collect()
}

#[test]
fn test_paths_with_spaces_and_unicode() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("my docs/report final.txt"), "same report");
    write(&data.join("архив/report (1).txt"), "same report");
    write(&data.join("日本/  leading spaces"), "same report");

    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let groups = scan(&dir, data.clone(), WalkerConfig::default(), strategy);
        assert_eq!(groups.len(), 1, "strategy {strategy}");
        assert_eq!(
            groups[0],
            vec!["  leading spaces", "report (1).txt", "report final.txt"]
        );
    }
}

#[test]
fn test_exclude_by_name_at_any_depth() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("src/lib.js"), "module.exports = 1");
    write(&data.join("node_modules/pkg/lib.js"), "module.exports = 1");
    write(&data.join("app/node_modules/pkg/lib.js"), "module.exports = 1");

    let walker = WalkerConfig::default().with_exclude(vec!["node_modules".to_string()]);
    let groups = scan(&dir, data, walker, ExtractStrategy::Seek);
    assert!(groups.is_empty());
}

#[test]
fn test_exclude_by_absolute_path() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("a/x.txt"), "duplicate");
    write(&data.join("b/x.txt"), "duplicate");
    write(&data.join("c/x.txt"), "duplicate");

    let excluded = data.join("b").to_string_lossy().into_owned();
    let walker = WalkerConfig::default().with_exclude(vec![excluded]);
    let groups = scan(&dir, data, walker, ExtractStrategy::Sort);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn test_skip_hidden() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("visible.txt"), "hidden twin");
    write(&data.join(".hidden.txt"), "hidden twin");
    write(&data.join(".git/objects/blob"), "hidden twin");

    let all = scan(&dir, data.clone(), WalkerConfig::default(), ExtractStrategy::Seek);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].len(), 3);

    let walker = WalkerConfig {
        skip_hidden: true,
        ..WalkerConfig::default()
    };
    let visible = scan(&dir, data, walker, ExtractStrategy::Sort);
    assert!(visible.is_empty());
}

#[test]
fn test_deeply_nested_tree() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let mut deep = data.clone();
    for level in 0..30 {
        deep = deep.join(format!("level{level}"));
    }
    write(&deep.join("bottom.txt"), "at the bottom");
    write(&data.join("top.txt"), "at the bottom");

    let groups = scan(&dir, data, WalkerConfig::default(), ExtractStrategy::Seek);
    assert_eq!(groups, vec![vec!["bottom.txt".to_string(), "top.txt".to_string()]]);
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_followed_by_default() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("real.txt"), "link target");
    std::os::unix::fs::symlink(data.join("real.txt"), data.join("link.txt")).unwrap();

    let groups = scan(&dir, data, WalkerConfig::default(), ExtractStrategy::Seek);
    assert!(groups.is_empty());
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_is_not_its_own_duplicate() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("only"), "unique content");
    std::os::unix::fs::symlink(data.join("only"), data.join("link")).unwrap();

    let walker = WalkerConfig {
        follow_symlinks: true,
        ..WalkerConfig::default()
    };
    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let groups = scan(&dir, data.clone(), walker.clone(), strategy);
        assert!(groups.is_empty(), "strategy {strategy}: {groups:?}");
    }
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_keeps_real_duplicates() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("a"), "shared content");
    write(&data.join("b"), "shared content");
    std::os::unix::fs::symlink(data.join("a"), data.join("c-link")).unwrap();

    let walker = WalkerConfig {
        follow_symlinks: true,
        ..WalkerConfig::default()
    };
    let groups = scan(&dir, data, walker, ExtractStrategy::Seek);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[cfg(unix)]
#[test]
fn test_carriage_return_in_file_name_is_skipped() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write(&data.join("x"), "AAAAAAAAAA");
    write(&data.join("x\r"), "BBBBBBBBBB");
    write(&data.join("y"), "BBBBBBBBBB");

    for strategy in [ExtractStrategy::Seek, ExtractStrategy::Sort] {
        let report = DuplicateFinder::new(
            FinderConfig::default()
                .with_output_dir(dir.path().join(format!("out-{strategy}")))
                .with_strategy(strategy),
        )
        .find_duplicates_in_paths(&[data.clone()], WalkerConfig::default())
        .unwrap();

        assert_eq!(report.summary.total_files, 2, "strategy {strategy}");
        assert_eq!(report.summary.skipped_files, 1);
        assert!(report.load_groups().unwrap().is_empty());
    }
}
