use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::client::transport::DEFAULT_TIMEOUT;
use crate::error::{Error, Result};

pub const APP_DIR: &str = "vikunja-flow";
pub const CONFIG_ENV: &str = "VIKUNJA_FLOW_CONFIG";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
}

fn default_service_name() -> String {
    "vikunja_flow".into()
}

fn default_action_keyword() -> String {
    "vik".into()
}

fn default_list_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_search_page_size() -> u32 {
    20
}

fn default_list_page_size() -> u32 {
    50
}

fn default_browser_command() -> String {
    if cfg!(target_os = "macos") {
        "open".into()
    } else if cfg!(target_os = "windows") {
        "explorer".into()
    } else {
        "xdg-open".into()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PluginConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Launcher keyword prefixed to follow-up queries.
    #[serde(default = "default_action_keyword")]
    pub action_keyword: String,
    #[serde(default = "default_list_cache_ttl_secs")]
    pub list_cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
    #[serde(default = "default_browser_command")]
    pub browser_command: String,
    /// Empty means probe for a known clipboard tool.
    #[serde(default)]
    pub clipboard_command: Vec<String>,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            service_name: default_service_name(),
            action_keyword: default_action_keyword(),
            list_cache_ttl_secs: default_list_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            search_page_size: default_search_page_size(),
            list_page_size: default_list_page_size(),
            browser_command: default_browser_command(),
            clipboard_command: Vec::new(),
            debug_logging: false,
        }
    }
}

impl PluginConfig {
    /// `$VIKUNJA_FLOW_CONFIG`, else `<config dir>/vikunja-flow/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    /// Settings from [`Self::default_path`]; no known path means defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// A missing file means defaults. An unreadable or malformed one is an
    /// error, left for the caller to report once logging is up.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }

    pub fn list_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.list_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = std::env::temp_dir().join(format!("vikunja-flow-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"action_keyword": "todo", "list_cache_ttl_secs": 5}"#).unwrap();

        let config = PluginConfig::load_from(&path).unwrap();
        assert_eq!(config.action_keyword, "todo");
        assert_eq!(config.list_cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(8));
        assert_eq!(config.search_page_size, 20);
    }

    #[test]
    fn missing_config_is_default() {
        let dir = std::env::temp_dir().join(format!("vikunja-flow-config-{}", uuid::Uuid::new_v4()));
        assert_eq!(
            PluginConfig::load_from(&dir.join("config.json")).unwrap(),
            PluginConfig::default()
        );
    }

    #[test]
    fn broken_config_is_reported() {
        let dir = std::env::temp_dir().join(format!("vikunja-flow-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        match PluginConfig::load_from(&path) {
            Err(Error::Config(msg)) => assert!(msg.starts_with("Invalid config")),
            other => panic!("expected a config error, got {:?}", other),
        }
    }
}
