//! Configuration for flashdeck.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing file gives defaults; a malformed one is
    /// reported and ignored.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(self)?;
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "flashdeck")
            .map(|d| d.config_dir().join("config.toml"))
    }

    pub fn default_data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "flashdeck")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON `.dck` file per deck.
    #[default]
    Json,
    /// A single SQLite database.
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Overrides the platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(Config::default_data_dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Shuffle cards at the start of every pass.
    #[serde(default)]
    pub randomize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_true() -> bool { true }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(config.storage.dir.is_none());
        assert!(!config.study.randomize);
        assert!(config.display.color);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "sqlite"

            [study]
            randomize = true
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.study.randomize);
        assert!(config.display.color);
    }

    #[test]
    fn test_load_from_missing_and_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path).storage.backend, StorageBackend::Json);

        std::fs::write(&path, "storage = [").unwrap();
        assert_eq!(Config::load_from(&path).storage.backend, StorageBackend::Json);

        std::fs::write(&path, "[display]\ncolor = false\n").unwrap();
        assert!(!Config::load_from(&path).display.color);
    }

    #[test]
    fn test_data_dir_override() {
        let storage = StorageConfig {
            backend: StorageBackend::Json,
            dir: Some(PathBuf::from("/tmp/decks")),
        };
        assert_eq!(storage.data_dir(), PathBuf::from("/tmp/decks"));
    }
}
