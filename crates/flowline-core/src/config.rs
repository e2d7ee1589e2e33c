use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::types::{ChainKeying, RunMode};

/// Top-level flowline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where the remote executor lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_path")]
    pub batch_path: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Whole-request timeout. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            batch_path: default_batch_path(),
            stream_path: default_stream_path(),
            health_path: default_health_path(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn batch_url(&self) -> String {
        join_url(&self.base_url, &self.batch_path)
    }

    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub chain_keying: ChainKeying,
    /// Clear loading flags of nodes that never received a streamed result
    /// once the stream ends.
    #[serde(default = "default_clear_loading_on_stream_end")]
    pub clear_loading_on_stream_end: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            chain_keying: ChainKeying::default(),
            clear_loading_on_stream_end: default_clear_loading_on_stream_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_batch_path() -> String { "/run-graph".to_string() }
fn default_stream_path() -> String { "/run-graph-stream".to_string() }
fn default_health_path() -> String { "/health".to_string() }
fn default_timeout_secs() -> u64 { 300 }
fn default_clear_loading_on_stream_end() -> bool { true }
fn default_queue_depth() -> usize { 64 }
fn default_event_capacity() -> usize { 256 }

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// `~/.flowline/config.toml`, if a home directory is known.
    pub fn home_config_path() -> Option<PathBuf> {
        dirs_home().map(|h| h.join(".flowline").join("config.toml"))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_FLOWLINE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_FLOWLINE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_FLOWLINE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_FLOWLINE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_FLOWLINE_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.executor.base_url, "http://localhost:8000");
        assert_eq!(config.executor.timeout_secs, 300);
        assert_eq!(config.run.mode, RunMode::Batch);
        assert_eq!(config.run.chain_keying, ChainKeying::Instance);
        assert!(config.run.clear_loading_on_stream_end);
        assert_eq!(config.session.queue_depth, 64);
    }

    #[test]
    fn test_endpoint_urls_join_cleanly() {
        let exec = ExecutorConfig {
            base_url: "http://exec:9000/".into(),
            ..Default::default()
        };
        assert_eq!(exec.batch_url(), "http://exec:9000/run-graph");
        assert_eq!(exec.stream_url(), "http://exec:9000/run-graph-stream");
        assert_eq!(exec.health_url(), "http://exec:9000/health");
    }

    #[test]
    fn test_run_section_parses_enums() {
        let toml_str = r#"
[run]
mode = "stream"
chain_keying = "domain"
clear_loading_on_stream_end = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.mode, RunMode::Stream);
        assert_eq!(config.run.chain_keying, ChainKeying::Domain);
        assert!(!config.run.clear_loading_on_stream_end);
    }
}
