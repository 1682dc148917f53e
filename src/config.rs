use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants;

pub mod credentials;
pub mod db;
pub mod migrations;
pub mod repository;

pub use credentials::StaticCredentials;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
}

/// Inbound HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Overall deadline for one inbound request; exceeded → 504
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

/// Outbound calls to the video-management backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_fallback_port")]
    pub fallback_port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_safety_margin_secs")]
    pub token_safety_margin_secs: i64,
    #[serde(default = "default_token_lifetime_secs")]
    pub default_token_lifetime_secs: u64,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// SQLite directory of backend servers. Disabled when no path is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySettings {
    #[serde(default)]
    pub database: Option<PathBuf>,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_request_deadline_secs() -> u64 {
    50
}

fn default_api_prefix() -> String {
    constants::API_PREFIX.to_string()
}

fn default_token_path() -> String {
    constants::TOKEN_PATH.to_string()
}

fn default_client_id() -> String {
    constants::CLIENT_ID.to_string()
}

fn default_fallback_port() -> u16 {
    constants::FALLBACK_PORT
}

fn default_timeout_secs() -> u64 {
    constants::REQUEST_TIMEOUT_SECS
}

fn default_token_safety_margin_secs() -> i64 {
    constants::TOKEN_SAFETY_MARGIN_SECS
}

fn default_token_lifetime_secs() -> u64 {
    constants::DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_batch_concurrency() -> usize {
    constants::BATCH_CONCURRENCY
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            token_path: default_token_path(),
            client_id: default_client_id(),
            fallback_port: default_fallback_port(),
            timeout_secs: default_timeout_secs(),
            token_safety_margin_secs: default_token_safety_margin_secs(),
            default_token_lifetime_secs: default_token_lifetime_secs(),
            batch_concurrency: default_batch_concurrency(),
            accept_invalid_certs: false,
        }
    }
}

impl ServerSettings {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProxyConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("vms-proxy")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".vms-proxy")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        debug!("Loading config from: {:?}", config_path);

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            Self::from_toml(&config_content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
        } else {
            info!("Config file {:?} doesn't exist, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid proxy configuration")
    }

    /// Apply `VMS_PROXY_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("VMS_PROXY_BIND").filter(|v| !v.is_empty()) {
            debug!("Bind address overridden by VMS_PROXY_BIND");
            self.server.bind = bind;
        }

        if let Some(database) = lookup("VMS_PROXY_DATABASE").filter(|v| !v.is_empty()) {
            debug!("Directory database overridden by VMS_PROXY_DATABASE");
            self.directory.database = Some(PathBuf::from(database));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8787");
        assert_eq!(config.backend.fallback_port, 8380);
        assert_eq!(config.backend.timeout(), Duration::from_secs(15));
        assert_eq!(config.backend.token_safety_margin_secs, 60);
        assert_eq!(config.backend.default_token_lifetime_secs, 3600);
        assert!(config.directory.database.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ProxyConfig::from_toml(
            r#"
            [backend]
            fallback_port = 9000
            accept_invalid_certs = true

            [directory]
            database = "/var/lib/vms-proxy/servers.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.fallback_port, 9000);
        assert!(config.backend.accept_invalid_certs);
        assert_eq!(config.backend.api_prefix, "/api/rest/v1");
        assert_eq!(config.server.request_deadline_secs, 50);
        assert_eq!(
            config.directory.database.as_deref(),
            Some(Path::new("/var/lib/vms-proxy/servers.db"))
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("VMS_PROXY_BIND", "0.0.0.0:9000"), ("VMS_PROXY_DATABASE", "")]
            .into_iter()
            .collect();

        let mut config = ProxyConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(config.directory.database.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend]\ntimeout_secs = 5\nbatch_concurrency = 2\n").unwrap();

        let config = ProxyConfig::load(Some(&path)).unwrap();
        assert_eq!(config.backend.timeout(), Duration::from_secs(5));
        assert_eq!(config.backend.batch_concurrency, 2);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.backend.fallback_port, 8380);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend\n").unwrap();

        assert!(ProxyConfig::load(Some(&path)).is_err());
    }
}
