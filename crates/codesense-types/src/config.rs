//! Client configuration types.
//!
//! `ClientConfig` is resolved once at startup (see `codesense-infra::config`)
//! and then shared read-only, typically behind an `Arc`.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Top-level configuration for the CodeSense client.
///
/// Loaded from `~/.codesense/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the code-intelligence service (no trailing slash required).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Interval between ingestion status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of user messages an anonymous caller may store per session.
    #[serde(default = "default_anonymous_quota")]
    pub anonymous_quota: u32,

    /// Maximum number of session summaries listed per repository.
    #[serde(default = "default_session_list_limit")]
    pub session_list_limit: u32,

    /// Overall timeout for a single HTTP request, including streamed bodies.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite URL for session persistence. Defaults to `{data_dir}/codesense.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_anonymous_quota() -> u32 {
    3
}

fn default_session_list_limit() -> u32 {
    20
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl ClientConfig {
    /// Poll interval as a `Duration`. Never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            poll_interval_ms: default_poll_interval_ms(),
            anonymous_quota: default_anonymous_quota(),
            session_list_limit: default_session_list_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default_values() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.anonymous_quota, 3);
        assert_eq!(config.session_list_limit, 20);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_client_config_deserialize_with_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_client_config_deserialize_with_values() {
        let toml_str = r#"
api_url = "https://codesense.example.com/api"
poll_interval_ms = 500
anonymous_quota = 5
database_url = "sqlite::memory:"
"#;
        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_url, "https://codesense.example.com/api");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.anonymous_quota, 5);
        assert_eq!(config.session_list_limit, 20);
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = ClientConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
