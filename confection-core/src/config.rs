use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for a catalog, usually read from `catalog.toml`:
///
/// ```toml
/// [store]
/// path = "/var/lib/confection/catalog"
/// sync_writes = true
///
/// [worker]
/// thread_name = "catalog-writer"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    /// Flush the write-ahead log to disk before a mutation returns.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            sync_writes: default_sync_writes(),
        }
    }
}

impl StoreConfig {
    /// The configured path, or the per-user data directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

fn default_sync_writes() -> bool {
    true
}

fn default_thread_name() -> String {
    "catalog-writer".to_string()
}

pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("confection")
        .join("catalog")
}

impl CatalogConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
