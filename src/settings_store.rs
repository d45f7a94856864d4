//! Byte-valued key/value settings storage
//!
//! The window only needs one key (its placement), but the store is generic so
//! other window state can live next to it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::constants::config::{APP_DIR, SETTINGS_FILENAME};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait SettingsStore: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set_value(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
}

/// In-process store, nothing survives the process
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    values: BTreeMap<String, Vec<u8>>,
}

/// JSON file store. The whole file is rewritten on every `set_value`.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    file: Mutex<SettingsFile>,
}

impl FileSettingsStore {
    /// `settings.json` under the platform config dir
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(SETTINGS_FILENAME);
        path
    }

    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            let file: SettingsFile =
                serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            info!(path = %path.display(), keys = file.values.len(), "Loaded settings store");
            file
        } else {
            debug!(path = %path.display(), "Settings file not found, starting empty");
            SettingsFile::default()
        };

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, file: &SettingsFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, contents).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Saved settings store");
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(file.values.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = file.clone();
        next.values.insert(key.to_string(), value);
        self.persist(&next)?;
        *file = next;
        Ok(())
    }
}
