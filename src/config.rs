//! Configuration management

use crate::error::{Error, Result};
use crate::logo_cache::{FetchConfig, DEFAULT_CACHE_DIR, DEFAULT_LOGO_SIZE, DEFAULT_USER_AGENT};
use crate::m3u_parser::{GroupFallback, ParseOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_logo_size")]
    pub logo_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default)]
    pub group_fallback: GroupFallback,
}

fn default_cache_dir() -> PathBuf { PathBuf::from(DEFAULT_CACHE_DIR) }
fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_logo_size() -> u32 { DEFAULT_LOGO_SIZE }
fn default_connect_timeout() -> u64 { 30 }
fn default_read_timeout() -> u64 { 60 }
fn default_max_redirects() -> u32 { 10 }

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            logo_size: default_logo_size(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_redirects: default_max_redirects(),
            group_fallback: GroupFallback::default(),
        }
    }
}

impl ViewerConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("m3u_viewer");
        path.push("config.json");
        path
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Ignoring config '{}': {}", path.display(), e),
            }
        } else {
            debug!("No config at '{}', using defaults", path.display());
        }

        Self::default()
    }

    /// Load an explicitly requested config file; errors are reported
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            max_redirects: self.max_redirects,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            group_fallback: self.group_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "logo_size": 48, "group_fallback": "Legacy" }"#).unwrap();

        let config = ViewerConfig::load_from(&path).unwrap();
        assert_eq!(config.logo_size, 48);
        assert_eq!(config.group_fallback, GroupFallback::Legacy);
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.parse_options().group_fallback, GroupFallback::Legacy);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ViewerConfig {
            cache_dir: PathBuf::from("/tmp/logos"),
            max_redirects: 3,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = ViewerConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.fetch_config().max_redirects, 3);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ViewerConfig::load_from(&path), Err(Error::Config(_))));
        assert!(matches!(
            ViewerConfig::load_from(&dir.path().join("absent.json")),
            Err(Error::Config(_))
        ));
    }
}
