use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::repositories::agent_repository::BoxFuture;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_BASE_URL: &str = "PLAY8_API_BASE_URL";
pub const ENV_SESSION_COOKIE: &str = "PLAY8_SESSION_COOKIE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Path error: {0}")]
    Path(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection settings for the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Sent as the `Cookie` header, standing in for a browser session.
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self.normalized()
    }

    /// Base URL without trailing slashes, so paths can be appended directly.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if trimmed.is_empty() {
            DEFAULT_API_BASE_URL.to_string()
        } else {
            trimmed.to_string()
        };
        self.session_cookie = self
            .session_cookie
            .map(|cookie| cookie.trim().to_string())
            .filter(|cookie| !cookie.is_empty());
        self
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            debug!(url = %url, "API base URL overridden from environment");
            self.api_base_url = url;
        }
        if let Some(cookie) = lookup(ENV_SESSION_COOKIE) {
            self.session_cookie = Some(cookie);
        }
        self.normalized()
    }

    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// Persists [`ClientConfig`] as JSON under the user's config directory.
pub struct ClientConfigRepository {
    file_path: PathBuf,
}

impl ClientConfigRepository {
    /// Repository at `<config_dir>/play8/client.json`.
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Path("Cannot determine config directory".into()))?;
        Ok(Self {
            file_path: config_dir.join("play8").join("client.json"),
        })
    }

    /// Create repository with custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.file_path
    }

    /// Load the saved config; a missing file yields the defaults.
    pub fn load(&self) -> BoxFuture<'static, ConfigResult<ClientConfig>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                return Ok(ClientConfig::default());
            }
            let contents = tokio::fs::read_to_string(&path).await?;
            let config: ClientConfig = serde_json::from_str(&contents)?;
            Ok(config.normalized())
        })
    }

    pub fn save(&self, config: ClientConfig) -> BoxFuture<'static, ConfigResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let json = serde_json::to_string_pretty(&config)?;

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, json).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8001/api/v1");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.session_cookie.is_none());
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let config = ClientConfig::default().with_base_url("https://play8.example/api/v1//");
        assert_eq!(config.api_base_url, "https://play8.example/api/v1");
        assert_eq!(
            config.endpoint("/agent/chat"),
            "https://play8.example/api/v1/agent/chat"
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_BASE_URL, "http://backend:9000/api/v1/"),
            (ENV_SESSION_COOKIE, "session=abc"),
        ]);
        let config = ClientConfig::default()
            .apply_env_with(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.api_base_url, "http://backend:9000/api/v1");
        assert_eq!(config.session_cookie.as_deref(), Some("session=abc"));
    }

    #[test]
    fn test_blank_cookie_is_dropped() {
        let config = ClientConfig {
            session_cookie: Some("  ".into()),
            ..Default::default()
        }
        .normalized();
        assert!(config.session_cookie.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ClientConfigRepository::with_path(dir.path().join("client.json"));
        assert_eq!(repo.load().await.unwrap(), ClientConfig::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ClientConfigRepository::with_path(dir.path().join("nested").join("client.json"));
        let config = ClientConfig {
            api_base_url: "https://play8.example/api/v1".into(),
            request_timeout_secs: 5,
            session_cookie: Some("session=xyz".into()),
        };
        repo.save(config.clone()).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), config);
        assert!(!dir.path().join("nested").join("client.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        tokio::fs::write(&path, r#"{"api_base_url":"http://x/api/"}"#)
            .await
            .unwrap();
        let config = ClientConfigRepository::with_path(path).load().await.unwrap();
        assert_eq!(config.api_base_url, "http://x/api");
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
