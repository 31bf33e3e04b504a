//! Config loading tests
//!
//! These tests verify that Config::load() merges the YAML file with CLI
//! flags and applies environment overrides for logging.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use std::env;
use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use tempo_trace_aggregation::config::{Cli, Config, LogFormat, SyncStrategy};
use tempo_trace_aggregation::error::AppError;
use tempo_trace_aggregation::tempo::SearchMode;

const FULL_CONFIG: &str = r#"
graph:
  name: cortex
  sync: incremental
query:
  tag: service.name
  tag_filter: "cortex.*"
  use_tag_as_node: false
  threshold_ms: 100
  service_subtitle: Entry
loop:
  interval: 60
search:
  from: 3600
  mode: ingester
tempo:
  url: http://tempo:3200
  headers:
    X-Scope-OrgID: tenant-1
  username: reader
  password: secret
  timeout_ms: 2500
nodegraph_provider:
  url: http://nodegraph:9393/
  headers:
logging:
  level: debug
  format: json
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

fn cli_for(file: &NamedTempFile) -> Cli {
    Cli {
        config: Some(file.path().to_path_buf()),
        ..Cli::default()
    }
}

#[test]
#[serial]
fn test_config_load_from_file() {
    let file = write_config(FULL_CONFIG);

    let config = Config::load(&cli_for(&file)).unwrap();

    assert_eq!(config.graph.name, "cortex");
    assert_eq!(config.graph.sync, SyncStrategy::Incremental);
    assert_eq!(config.query.tag_filter.as_str(), "cortex.*");
    assert!(!config.query.use_tag_as_node);
    assert_eq!(config.query.threshold_ms, 100.0);
    assert_eq!(config.query.service_subtitle, "Entry");
    assert_eq!(config.schedule.interval_secs, 60);
    assert_eq!(config.search.from_secs, 3600);
    assert_eq!(config.search.mode, SearchMode::Ingesters);

    assert_eq!(config.tempo.url, "http://tempo:3200");
    assert_eq!(
        config.tempo.headers.get("X-Scope-OrgID").map(String::as_str),
        Some("tenant-1")
    );
    assert_eq!(config.tempo.username.as_deref(), Some("reader"));
    assert_eq!(config.tempo.timeout_ms, 2500);

    assert_eq!(config.nodegraph_provider.url, "http://nodegraph:9393");
    assert!(config.nodegraph_provider.headers.is_empty());
}

#[test]
#[serial]
fn test_cli_overrides_file() {
    let file = write_config(FULL_CONFIG);
    let cli = Cli {
        graph: Some("override".to_string()),
        tag_filter: Some("loki.*".to_string()),
        loop_interval: Some(0),
        search_from: Some(60),
        search_mode: Some("all".to_string()),
        threshold_ms: Some(5.0),
        sync: Some("batch".to_string()),
        tempo_url: Some("http://other-tempo".to_string()),
        ..cli_for(&file)
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.graph.name, "override");
    assert_eq!(config.graph.sync, SyncStrategy::Batch);
    assert_eq!(config.query.tag_filter.as_str(), "loki.*");
    assert_eq!(config.schedule.interval_secs, 0);
    assert_eq!(config.search.from_secs, 60);
    assert_eq!(config.search.mode, SearchMode::All);
    assert_eq!(config.query.threshold_ms, 5.0);
    assert_eq!(config.tempo.url, "http://other-tempo");
}

#[test]
#[serial]
fn test_not_use_tag_as_node_flag() {
    let file = write_config(
        "query:\n  use_tag_as_node: true\ntempo:\n  url: http://t\nnodegraph_provider:\n  url: http://n\n",
    );
    let cli = Cli {
        not_use_tag_as_node: true,
        ..cli_for(&file)
    };

    let config = Config::load(&cli).unwrap();
    assert!(!config.query.use_tag_as_node);
}

#[test]
#[serial]
fn test_missing_explicit_config_file_is_error() {
    let cli = Cli {
        config: Some("/nonexistent/tta/config.yml".into()),
        ..Cli::default()
    };

    let err = Config::load(&cli).unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
}

#[test]
#[serial]
fn test_missing_nodegraph_url_is_error() {
    let file = write_config("tempo:\n  url: http://tempo:3200\n");

    let err = Config::load(&cli_for(&file)).unwrap_err();
    assert!(err.to_string().contains("nodegraph_provider.url"));
}

#[test]
#[serial]
fn test_invalid_yaml_is_error() {
    let file = write_config("graph: [unclosed\n");

    let err = Config::load(&cli_for(&file)).unwrap_err();
    assert!(matches!(err, AppError::Yaml(_)));
}

#[test]
#[serial]
fn test_config_from_env_log_overrides() {
    let file = write_config(FULL_CONFIG);
    env::set_var("LOG_LEVEL", "warn");
    env::set_var("LOG_FORMAT", "pretty");

    let config = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("LOG_LEVEL");
    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_logging_from_file() {
    env::remove_var("LOG_LEVEL");
    env::remove_var("LOG_FORMAT");
    let file = write_config(FULL_CONFIG);

    let config = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn test_config_log_file_from_file_and_env() {
    env::remove_var("LOG_FILE");
    let file = write_config(
        "tempo:\n  url: http://t\nnodegraph_provider:\n  url: http://n\nlogging:\n  file: /var/log/tta.log\n",
    );

    let config = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(
        config.logging.file.as_deref(),
        Some(std::path::Path::new("/var/log/tta.log"))
    );

    env::set_var("LOG_FILE", "/tmp/tta-override.log");
    let config = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(
        config.logging.file.as_deref(),
        Some(std::path::Path::new("/tmp/tta-override.log"))
    );

    env::set_var("LOG_FILE", "");
    let config = Config::load(&cli_for(&file)).unwrap();
    assert!(config.logging.file.is_none());

    env::remove_var("LOG_FILE");
}
