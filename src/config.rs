// DriveShare Configuration
// Persistent portal settings with environment overrides

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::accumulator::{AccumulatorLimits, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_PAGES};

/// Marker left in freshly generated configs until the script is deployed
pub const PLACEHOLDER_SCRIPT_URL: &str = "PLACEHOLDER";

pub const ENV_SCRIPT_URL: &str = "DRIVESHARE_SCRIPT_URL";
pub const ENV_ROOT_FOLDER: &str = "DRIVESHARE_ROOT_FOLDER";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Setup required: {0}")]
    SetupRequired(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Deployed script endpoint receiving every action
    #[serde(default = "default_script_url")]
    pub script_url: String,
    /// Folder shown when no folder is requested
    #[serde(default = "default_root_folder")]
    pub root_folder_id: String,
    /// Public portal address used to build share links
    #[serde(default)]
    pub portal_url: Option<String>,
    /// Toast lifetime in milliseconds
    #[serde(default = "default_toast_ttl_ms")]
    pub toast_ttl_ms: u64,
    /// Page cap for a single folder accumulation
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Entry cap for a single folder accumulation
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Optional connect timeout; requests themselves are never timed out
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Completion service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
    #[serde(default = "default_assistant_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_script_url() -> String {
    PLACEHOLDER_SCRIPT_URL.to_string()
}

fn default_root_folder() -> String {
    "root".to_string()
}

fn default_toast_ttl_ms() -> u64 {
    3000
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_assistant_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_assistant_model() -> String {
    "gemini-3-flash-preview".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_assistant_base_url(),
            model: default_assistant_model(),
            api_key: None,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            script_url: default_script_url(),
            root_folder_id: default_root_folder(),
            portal_url: None,
            toast_ttl_ms: default_toast_ttl_ms(),
            max_pages: default_max_pages(),
            max_entries: default_max_entries(),
            connect_timeout_secs: None,
            assistant: AssistantConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Apply overrides from an environment-like lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(url) = non_empty(ENV_SCRIPT_URL) {
            self.script_url = url;
        }
        if let Some(root) = non_empty(ENV_ROOT_FOLDER) {
            self.root_folder_id = root;
        }
        if let Some(key) = non_empty(ENV_GEMINI_API_KEY) {
            self.assistant.api_key = Some(key);
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Check the settings needed to reach the backend
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.script_url.trim();
        if url.is_empty() || url.contains(PLACEHOLDER_SCRIPT_URL) {
            return Err(ConfigError::SetupRequired(format!(
                "set script_url in the config file or {}",
                ENV_SCRIPT_URL
            )));
        }
        let parsed = url::Url::parse(url)
            .map_err(|e| ConfigError::Invalid(format!("script_url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("script_url must use http or https".to_string()));
        }
        if self.root_folder_id.trim().is_empty() {
            return Err(ConfigError::Invalid("root_folder_id cannot be empty".to_string()));
        }
        if self.max_pages == 0 || self.max_entries == 0 {
            return Err(ConfigError::Invalid("page and entry limits must be positive".to_string()));
        }
        Ok(())
    }

    pub fn limits(&self) -> AccumulatorLimits {
        AccumulatorLimits {
            max_pages: self.max_pages,
            max_entries: self.max_entries,
        }
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    /// HTTP client for backend and download traffic
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("driveshare/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

/// Default config location: `<config dir>/driveshare/config.json`
pub fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("driveshare").join("config.json")
}

/// Load configuration; a missing file yields defaults
pub fn load_config(path: &Path) -> Result<PortalConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(PortalConfig::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(path: &Path, config: &PortalConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    tracing::info!("Config saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PortalConfig::default();
        assert_eq!(config.root_folder_id, "root");
        assert_eq!(config.toast_ttl(), Duration::from_secs(3));
        assert_eq!(config.limits(), AccumulatorLimits::default());
        assert_eq!(config.assistant.model, "gemini-3-flash-preview");
    }

    #[test]
    fn test_placeholder_requires_setup() {
        let config = PortalConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::SetupRequired(_))));

        let mut config = PortalConfig::default();
        config.script_url = "   ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::SetupRequired(_))));
    }

    #[test]
    fn test_validate_config() {
        let mut config = PortalConfig::default();
        config.script_url = "https://script.example.com/macros/s/abc/exec".to_string();
        assert!(config.validate().is_ok());

        config.script_url = "ftp://script.example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.script_url = "https://script.example.com/exec".to_string();
        config.max_pages = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SCRIPT_URL, "https://example.com/exec"),
            (ENV_ROOT_FOLDER, ""),
            (ENV_GEMINI_API_KEY, "k-123"),
        ]);
        let mut config = PortalConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.script_url, "https://example.com/exec");
        assert_eq!(config.root_folder_id, "root");
        assert_eq!(config.assistant.api_key.as_deref(), Some("k-123"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"script_url":"https://example.com/exec","max_pages":5}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.root_folder_id, "root");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        assert_eq!(load_config(&path).unwrap().script_url, PLACEHOLDER_SCRIPT_URL);

        let mut config = PortalConfig::default();
        config.portal_url = Some("https://portal.example.com".to_string());
        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.portal_url.as_deref(), Some("https://portal.example.com"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
