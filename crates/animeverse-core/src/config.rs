use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::AnimeverseError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub request_timeout_secs: u64,
}

impl ImagesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

/// Where resolved image pairs are checked and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Local,
    Remote,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub base_url: String,
    pub stale_after_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Local,
            base_url: "http://localhost:8080".into(),
            stale_after_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub jikan: ProviderToggle,
    #[serde(default)]
    pub anilist: ProviderToggle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderToggle {
    pub enabled: bool,
    /// Overrides the public API endpoint (mirrors, local proxies).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderToggle {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

impl AppConfig {
    /// Load config: the user file if it exists, otherwise built-in defaults.
    pub fn load() -> Result<Self, AnimeverseError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::parse(DEFAULT_CONFIG)
        }
    }

    /// Load config from an explicit path. Missing sections fall back to defaults.
    pub fn load_from(path: &Path) -> Result<Self, AnimeverseError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AnimeverseError::Config(e.to_string()))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, AnimeverseError> {
        toml::from_str(content).map_err(|e| AnimeverseError::Config(e.to_string()))
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the image store database.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("animeverse.db"))
            .unwrap_or_else(|| PathBuf::from("animeverse.db"))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, AnimeverseError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "animeverse")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.images.request_timeout_secs, 10);
        assert_eq!(config.store.kind, StoreKind::Local);
        assert_eq!(config.store.stale_after_days, 30);
        assert!(config.providers.jikan.enabled);
        assert!(config.providers.anilist.enabled);
        assert!(config.providers.anilist.base_url.is_none());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config = AppConfig::parse(
            r#"
            [store]
            kind = "remote"
            base_url = "https://animeverse.example"
            stale_after_days = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.store.kind, StoreKind::Remote);
        assert_eq!(config.images.request_timeout(), Duration::from_secs(10));
        assert!(config.providers.jikan.enabled);
    }

    #[test]
    fn test_partial_section_keeps_other_keys() {
        let config = AppConfig::parse("[store]\nkind = \"none\"\n").unwrap();
        assert_eq!(config.store.kind, StoreKind::None);
        assert_eq!(config.store.base_url, "http://localhost:8080");
        assert_eq!(config.store.stale_after_days, 30);

        let config =
            AppConfig::parse("[providers.jikan]\nbase_url = \"http://127.0.0.1:9000\"\n").unwrap();
        assert!(config.providers.jikan.enabled);
        assert_eq!(
            config.providers.jikan.base_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );

        let config = AppConfig::parse("[images]\n").unwrap();
        assert_eq!(config.images.request_timeout_secs, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[providers.jikan]\nenabled = false\nbase_url = \"http://127.0.0.1:9000\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.providers.jikan.enabled);
        assert_eq!(
            config.providers.jikan.base_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(config.store.kind, StoreKind::Local);
    }

    #[test]
    fn test_invalid_store_kind_is_config_error() {
        let err = AppConfig::parse("[store]\nkind = \"mongo\"\nbase_url = \"\"\nstale_after_days = 1\n")
            .unwrap_err();
        assert!(matches!(err, AnimeverseError::Config(_)));
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.store.kind, config.store.kind);
        assert_eq!(
            deserialized.images.request_timeout_secs,
            config.images.request_timeout_secs
        );
    }
}
