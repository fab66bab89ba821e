//! Application configuration management.
//!
//! Configuration is stored at `~/.config/rolegate/config.json` and can be
//! overridden from the environment (a `.env` file works too). It decides
//! which identity resolver is used, where the backend lives, where the
//! credential is persisted, and how role resolution is retried.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "rolegate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// Port of the JS bundler dev server, a common mistake for the API port
const BUNDLER_PORT: &str = ":8081";

static WARNED_BUNDLER_PORT: AtomicBool = AtomicBool::new(false);

/// Where the credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            "memory" => Ok(CredentialBackend::Memory),
            other => Err(format!("unknown credential backend: {}", other)),
        }
    }
}

/// Backoff settings for transient role-resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// `None` keeps retrying for as long as the session stays pending.
    pub max_attempts: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mock_auth: bool,
    pub api_base_url: Option<String>,
    pub auth_login_path: String,
    pub auth_me_path: String,
    pub auth_refresh_path: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub retry: RetrySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mock_auth: false,
            api_base_url: None,
            auth_login_path: "/auth/login".to_string(),
            auth_me_path: "/auth/me".to_string(),
            auth_refresh_path: "/auth/refresh".to_string(),
            request_timeout_secs: 20,
            credential_backend: CredentialBackend::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `ROLEGATE_*` (and a few unprefixed) environment variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = first_set(&lookup, &["ROLEGATE_MOCK_AUTH", "MOCK_AUTH"]) {
            self.mock_auth = is_env_true(&v);
        }
        if let Some(v) = first_set(&lookup, &["ROLEGATE_API_BASE_URL", "API_BASE_URL"]) {
            self.api_base_url = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["ROLEGATE_AUTH_LOGIN_PATH"]) {
            self.auth_login_path = v.trim().to_string();
        }
        if let Some(v) = first_set(&lookup, &["ROLEGATE_AUTH_ME_PATH"]) {
            self.auth_me_path = v.trim().to_string();
        }
        if let Some(v) = first_set(&lookup, &["ROLEGATE_AUTH_REFRESH_PATH"]) {
            self.auth_refresh_path = v.trim().to_string();
        }
        if let Some(v) = first_set(&lookup, &["ROLEGATE_CREDENTIAL_BACKEND"]) {
            match v.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring ROLEGATE_CREDENTIAL_BACKEND"),
            }
        }
    }

    /// Normalized API base URL
    pub fn api_base_url(&self) -> String {
        let raw = self
            .api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(raw) = raw else {
            return DEFAULT_API_BASE_URL.to_string();
        };

        let url = normalize_url(raw);
        if url.contains(BUNDLER_PORT) && !WARNED_BUNDLER_PORT.swap(true, Ordering::Relaxed) {
            warn!(url = %url, "API base URL points at port 8081, which is usually the bundler, not the backend");
        }
        url
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the credential store for the configured backend.
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        Ok(match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
            CredentialBackend::File => Arc::new(FileCredentialStore::new(self.cache_dir()?)),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        })
    }
}

/// First non-blank value among `keys`.
fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
}

fn is_env_true(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn normalize_url(input: &str) -> String {
    let lower = input.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.mock_auth);
        assert_eq!(config.api_base_url(), "http://localhost:3000");
        assert_eq!(config.auth_me_path, "/auth/me");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("api.example.com"), "http://api.example.com");
        assert_eq!(normalize_url("https://api.example.com"), "https://api.example.com");
        assert_eq!(normalize_url("HTTP://x"), "HTTP://x");
    }

    #[test]
    fn test_blank_base_url_uses_default() {
        let config = Config {
            api_base_url: Some("   ".into()),
            ..Config::default()
        };
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_env_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "On "] {
            assert!(is_env_true(value), "{} should be truthy", value);
        }
        for value in ["0", "false", "off", "nope"] {
            assert!(!is_env_true(value), "{} should be falsy", value);
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("MOCK_AUTH", "1"),
            ("API_BASE_URL", "10.0.2.2:4000"),
            ("ROLEGATE_AUTH_ME_PATH", " /v2/me "),
            ("ROLEGATE_CREDENTIAL_BACKEND", "file"),
        ]));
        assert!(config.mock_auth);
        assert_eq!(config.api_base_url(), "http://10.0.2.2:4000");
        assert_eq!(config.auth_me_path, "/v2/me");
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }

    #[test]
    fn test_prefixed_env_wins_and_bad_backend_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("ROLEGATE_MOCK_AUTH", "false"),
            ("MOCK_AUTH", "true"),
            ("ROLEGATE_CREDENTIAL_BACKEND", "floppy"),
        ]));
        assert!(!config.mock_auth);
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
    }

    #[test]
    fn test_blank_prefixed_env_falls_through() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("ROLEGATE_MOCK_AUTH", ""),
            ("MOCK_AUTH", "1"),
            ("ROLEGATE_API_BASE_URL", "  "),
            ("API_BASE_URL", "api.example.com"),
        ]));
        assert!(config.mock_auth);
        assert_eq!(config.api_base_url(), "http://api.example.com");
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{ "mock_auth": true, "credential_backend": "memory", "retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.mock_auth);
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.auth_login_path, "/auth/login");
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(!config.mock_auth);
    }
}
