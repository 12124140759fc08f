use dupescan::config::{Config, ConfigError, ExtractStrategy, PipelineConfig};
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.pipeline, PipelineConfig::default());
    assert!(config.output_dir.is_none());
    assert_eq!(config.pipeline.max_in_flight, 128);
    assert_eq!(config.pipeline.write_queue_capacity, 1024);
    assert!(config.pipeline.keep_intermediate);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("DUPESCAN_PIPELINE__SORT_CHUNK_LINES", "77");
    std::env::set_var("DUPESCAN_PIPELINE__STRATEGY", "sort");

    use figment::providers::Env;
    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DUPESCAN_").split("__"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.pipeline.sort_chunk_lines, 77);
    assert_eq!(config.pipeline.strategy, ExtractStrategy::Sort);

    std::env::remove_var("DUPESCAN_PIPELINE__SORT_CHUNK_LINES");
    std::env::remove_var("DUPESCAN_PIPELINE__STRATEGY");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
output_dir = "/var/tmp/dupescan"

[pipeline]
max_in_flight = 32
io_threads = 2
hash_width = 24
strategy = "sort"
keep_intermediate = false
"#;
    fs::write(&config_path, toml_content).unwrap();

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.output_dir, Some(PathBuf::from("/var/tmp/dupescan")));
    assert_eq!(config.pipeline.max_in_flight, 32);
    assert_eq!(config.pipeline.io_threads, 2);
    assert_eq!(config.pipeline.hash_width, 24);
    assert_eq!(config.pipeline.strategy, ExtractStrategy::Sort);
    assert!(!config.pipeline.keep_intermediate);
    // Fields absent from the file keep their defaults
    assert_eq!(config.pipeline.sort_chunk_lines, 10_000);
}

#[test]
fn test_config_load_explicit_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("dupescan.toml");
    fs::write(&config_path, "[pipeline]\nread_chunk_size = 4096\n").unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.pipeline.read_chunk_size, 4096);
}

#[test]
fn test_config_missing_explicit_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let result = Config::load(Some(&temp_dir.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Invalid { field: "config", .. })));
}

#[test]
fn test_config_rejects_invalid_values() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[pipeline]\nhash_width = 4\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Invalid { field: "hash_width", .. })
    ));

    fs::write(&config_path, "[pipeline]\nmax_in_flight = 0\n").unwrap();
    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Invalid { field: "max_in_flight", .. })
    ));
}

#[test]
fn test_config_malformed_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("broken.toml");
    fs::write(&config_path, "[pipeline\nmax_in_flight = ").unwrap();

    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_resolved_output_dir() {
    let config = Config {
        output_dir: Some(PathBuf::from("/tmp/x")),
        ..Config::default()
    };
    assert_eq!(config.resolved_output_dir(), PathBuf::from("/tmp/x"));
    assert!(Config::default()
        .resolved_output_dir()
        .ends_with("output-data"));
}
