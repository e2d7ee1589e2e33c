use std::io::Write;

use flowline_core::config::AppConfig;
use flowline_core::error::FlowError;
use flowline_core::types::{ChainKeying, RunMode};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[executor]
base_url = "http://executor.internal:9000/"
batch_path = "/v2/run-graph"
stream_path = "v2/run-graph-stream"
timeout_secs = 30

[executor.headers]
x-flow-token = "abc"

[run]
mode = "stream"
chain_keying = "domain"
clear_loading_on_stream_end = false

[session]
queue_depth = 8
event_capacity = 32
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.executor.batch_url(), "http://executor.internal:9000/v2/run-graph");
    assert_eq!(
        config.executor.stream_url(),
        "http://executor.internal:9000/v2/run-graph-stream"
    );
    assert_eq!(config.executor.health_url(), "http://executor.internal:9000/health");
    assert_eq!(config.executor.timeout_secs, 30);
    assert_eq!(config.executor.headers.get("x-flow-token").map(String::as_str), Some("abc"));
    assert_eq!(config.run.mode, RunMode::Stream);
    assert_eq!(config.run.chain_keying, ChainKeying::Domain);
    assert!(!config.run.clear_loading_on_stream_end);
    assert_eq!(config.session.queue_depth, 8);
    assert_eq!(config.session.event_capacity, 32);
}

#[test]
fn test_load_partial_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[run]\nmode = \"batch\"\n").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.executor.batch_url(), "http://localhost:8000/run-graph");
    assert_eq!(config.run.chain_keying, ChainKeying::Instance);
    assert!(config.run.clear_loading_on_stream_end);
}

#[test]
fn test_env_var_expansion_in_headers() {
    std::env::set_var("FLOWLINE_TEST_TOKEN", "from-env");
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[executor.headers]\nauthorization = \"Bearer ${FLOWLINE_TEST_TOKEN}\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.executor.headers.get("authorization").map(String::as_str),
        Some("Bearer from-env")
    );
    std::env::remove_var("FLOWLINE_TEST_TOKEN");
}

#[test]
fn test_missing_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/flowline.toml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_mode_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[run]\nmode = \"sometimes\"\n").expect("write toml");
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(FlowError::Config(_))
    ));
}
