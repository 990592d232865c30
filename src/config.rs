use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
    #[serde(default = "default_persist_limit")]
    pub persist_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
            persist_limit: default_persist_limit(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./carrel-session.json")
}
fn default_persist_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_fresh_secs")]
    pub fresh_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_secs: default_fresh_secs(),
        }
    }
}

fn default_fresh_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
        }
    }
}

fn default_poll_secs() -> u64 {
    30
}

impl BackendConfig {
    /// Base URL with the API prefix, no trailing slash.
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.base_url.trim_end_matches('/'))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    // A missing config file is not an error: every field has a default.
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.backend.base_url.is_empty() {
        anyhow::bail!("backend.base_url must not be empty");
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    if config.chat.top_k == 0 {
        anyhow::bail!("chat.top_k must be >= 1");
    }

    if config.session.persist_limit == 0 {
        anyhow::bail!("session.persist_limit must be >= 1");
    }

    if config.health.poll_secs == 0 {
        anyhow::bail!("health.poll_secs must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.chat.top_k, 5);
        assert_eq!(config.session.persist_limit, 50);
        assert_eq!(config.cache.fresh_secs, 60);
        assert_eq!(config.health.poll_secs, 30);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[backend]\nbase_url = \"http://corpus:9000/\"\n").unwrap();
        assert_eq!(config.backend.base_url, "http://corpus:9000/");
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.backend.api_base(), "http://corpus:9000/api/v1");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("./no-such-carrel.toml")).unwrap();
        assert_eq!(config.chat.top_k, 5);
    }
}
