//! Client configuration: JSON file plus environment overrides.

use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use bindery_types::Scheme;
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_ENV: &str = "BINDERY_CONFIG_PATH";
pub const TIMEOUT_ENV: &str = "BINDERY_TIMEOUT_SECS";
pub const RETRIES_ENV: &str = "BINDERY_RETRIES";
pub const HOST_ENV: &str = "BINDERY_HOST";
pub const PORT_ENV: &str = "BINDERY_PORT";
pub const SCHEME_ENV: &str = "BINDERY_SCHEME";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for outbound calls.
///
/// `host`, `port` and `scheme` override the connection declared by the
/// contract when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Additional attempts after a timeout or connection failure.
    pub retries: u32,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: 0,
            user_agent: default_user_agent(),
            host: None,
            port: None,
            scheme: None,
        }
    }
}

impl ClientConfig {
    /// Reads the config file (when present) and applies environment overrides.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file, or a
    /// malformed override variable, is an error.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))?
        } else {
            ClientConfig::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_value(TIMEOUT_ENV) {
            self.timeout_secs = value.parse().with_context(|| format!("{TIMEOUT_ENV}='{value}'"))?;
        }
        if let Some(value) = env_value(RETRIES_ENV) {
            self.retries = value.parse().with_context(|| format!("{RETRIES_ENV}='{value}'"))?;
        }
        if let Some(value) = env_value(HOST_ENV) {
            self.host = Some(value);
        }
        if let Some(value) = env_value(PORT_ENV) {
            self.port = Some(value.parse().with_context(|| format!("{PORT_ENV}='{value}'"))?);
        }
        if let Some(value) = env_value(SCHEME_ENV) {
            let scheme = value.parse::<Scheme>().map_err(|err| anyhow!("{SCHEME_ENV}='{value}': {err}"))?;
            self.scheme = Some(scheme);
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_user_agent() -> String {
    format!("bindery/{}", env!("CARGO_PKG_VERSION"))
}

/// Get the default path for the client configuration file.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bindery")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ENV: [&str; 5] = [TIMEOUT_ENV, RETRIES_ENV, HOST_ENV, PORT_ENV, SCHEME_ENV];

    fn without_overrides<F: FnOnce()>(path: &std::path::Path, f: F) {
        let mut vars: Vec<(&str, Option<String>)> = ALL_ENV.iter().map(|key| (*key, None)).collect();
        vars.push((CONFIG_PATH_ENV, Some(path.display().to_string())));
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        without_overrides(&path, || {
            let config = ClientConfig::load().expect("load defaults");
            assert_eq!(config.timeout_secs, 10);
            assert_eq!(config.retries, 0);
            assert!(config.user_agent.starts_with("bindery/"));
            assert!(config.host.is_none());
        });
    }

    #[test]
    fn file_values_are_read_and_partial_files_keep_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"retries": 2, "host": "localhost", "scheme": "http"}"#).expect("write config");
        without_overrides(&path, || {
            let config = ClientConfig::load().expect("load file");
            assert_eq!(config.retries, 2);
            assert_eq!(config.timeout_secs, 10);
            assert_eq!(config.host.as_deref(), Some("localhost"));
            assert_eq!(config.scheme, Some(Scheme::Http));
        });
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"timeout_secs": 30, "port": 8080}"#).expect("write config");
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, Some(path.display().to_string())),
                (TIMEOUT_ENV, Some("3".to_string())),
                (RETRIES_ENV, Some("1".to_string())),
                (HOST_ENV, Some("127.0.0.1".to_string())),
                (PORT_ENV, None),
                (SCHEME_ENV, Some("https".to_string())),
            ],
            || {
                let config = ClientConfig::load().expect("load with env");
                assert_eq!(config.timeout_secs, 3);
                assert_eq!(config.retries, 1);
                assert_eq!(config.host.as_deref(), Some("127.0.0.1"));
                assert_eq!(config.port, Some(8080));
                assert_eq!(config.scheme, Some(Scheme::Https));
            },
        );
    }

    #[test]
    fn malformed_override_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, Some(path.display().to_string())),
                (PORT_ENV, Some("not-a-port".to_string())),
            ],
            || {
                let error = ClientConfig::load().expect_err("bad port");
                assert!(error.to_string().contains(PORT_ENV));
            },
        );
    }
}
