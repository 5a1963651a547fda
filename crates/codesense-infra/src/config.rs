//! Client configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.codesense/` by default)
//! into [`ClientConfig`], falling back to defaults when the file is missing
//! or malformed, then applies environment overrides. The result is read once
//! at startup and never mutated afterwards.

use std::path::{Path, PathBuf};

use codesense_types::config::ClientConfig;

/// Overrides `api_url` from the config file.
pub const API_URL_ENV: &str = "CODESENSE_API_URL";

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "CODESENSE_DATA_DIR";

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory: `CODESENSE_DATA_DIR`, else `~/.codesense`.
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codesense")
}

/// Load client configuration from `{data_dir}/config.toml` plus environment
/// overrides.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let mut config = read_config_file(data_dir).await;
    apply_api_url_override(&mut config, std::env::var(API_URL_ENV).ok());
    config
}

/// Parse the config file.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: a warning is logged and defaults used.
pub async fn read_config_file(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ClientConfig::default()
        }
    }
}

fn apply_api_url_override(config: &mut ClientConfig, value: Option<String>) {
    if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        tracing::debug!(api_url = %url, "{API_URL_ENV} overrides configured api_url");
        config.api_url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.anonymous_quota, 3);
    }

    #[tokio::test]
    async fn test_read_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
api_url = "https://codesense.example.com"
poll_interval_ms = 500
database_url = "sqlite:///tmp/sessions.db"
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.api_url, "https://codesense.example.com");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.database_url.as_deref(), Some("sqlite:///tmp/sessions.db"));
        // Unset fields keep their defaults.
        assert_eq!(config.session_list_limit, 20);
    }

    #[tokio::test]
    async fn test_read_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_api_url_override_replaces_configured_value() {
        let mut config = ClientConfig::default();
        apply_api_url_override(&mut config, Some(" http://10.0.0.5:8000 ".to_string()));
        assert_eq!(config.api_url, "http://10.0.0.5:8000");
    }

    #[test]
    fn test_blank_api_url_override_is_ignored() {
        let mut config = ClientConfig::default();
        apply_api_url_override(&mut config, Some("   ".to_string()));
        apply_api_url_override(&mut config, None);
        assert_eq!(config.api_url, "http://localhost:8000");
    }
}
