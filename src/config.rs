// Configuration for the todolist binary

use crate::storage::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
use crate::store::{DEFAULT_STORAGE_KEY, StoreOptions};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "todolist";
const CONFIG_FILE: &str = "config.yml";
const SQLITE_FILE: &str = "todolist.db";

/// Which durable store backs the collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Data directory; files or the SQLite database live here
    pub path: PathBuf,
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: default_data_dir(),
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    /// Record `createdAt` on new tasks
    pub timestamps: bool,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            timestamps: true,
            log_level: "warn".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// `$XDG_CONFIG_HOME/todolist/config.yml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when `None`
    ///
    /// Only a missing default file yields the defaults; an explicit path must
    /// exist. A file that does not parse is an error either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            path => {
                debug!(path = ?path, "No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).context(format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            key: self.storage.key.clone(),
            timestamps: self.timestamps,
        }
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Box<dyn KeyValueStore>> {
        let path = &self.storage.path;
        let backend: Box<dyn KeyValueStore> = match self.storage.backend {
            Backend::File => Box::new(
                FileStore::open(path).context(format!("Failed to open file store at {}", path.display()))?,
            ),
            Backend::Sqlite => {
                let db_path = path.join(SQLITE_FILE);
                Box::new(
                    SqliteStore::open(&db_path)
                        .context(format!("Failed to open SQLite store at {}", db_path.display()))?,
                )
            }
            Backend::Memory => Box::new(MemoryStore::new()),
        };
        Ok(backend)
    }
}
