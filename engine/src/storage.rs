//! The two storage namespaces.
//!
//! - **Local**: the single [`PersistedState`] slot, a JSON file overwritten on
//!   every completed cycle.
//! - **Synchronized**: the API key, living in the config file and re-read on
//!   every cycle so `set-key` takes effect without a restart.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use becwatch_config::BecwatchConfig;
use becwatch_types::{ApiKey, PersistedState};
use becwatch_utils::atomic_write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read state at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write state at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Local namespace holding the most recent completed analysis.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedState>, StorageError>;

    /// Overwrite the slot.
    fn save(&self, state: &PersistedState) -> Result<(), StorageError>;
}

/// JSON file store (`~/.becwatch/state.json`).
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the state file, for cross-process change polling.
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(StorageError::Encode)?;
        atomic_write(&self.path, &bytes).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process store for unit tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStateStore {
    slot: std::sync::Mutex<Option<PersistedState>>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}

/// Synchronized namespace: where the API key comes from.
pub trait ApiKeySource: Send + Sync {
    fn api_key(&self) -> Option<ApiKey>;
}

/// Fixed key, or none.
impl ApiKeySource for Option<ApiKey> {
    fn api_key(&self) -> Option<ApiKey> {
        self.clone()
    }
}

/// Re-reads the config file on every lookup.
#[derive(Debug, Clone)]
pub struct ConfigKeySource {
    path: Option<PathBuf>,
}

impl ConfigKeySource {
    /// Source backed by `~/.becwatch/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: BecwatchConfig::path(),
        }
    }

    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl Default for ConfigKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiKeySource for ConfigKeySource {
    fn api_key(&self) -> Option<ApiKey> {
        let config = match self.path.as_deref().map(BecwatchConfig::load_from) {
            Some(Ok(Some(config))) => config,
            Some(Err(e)) => {
                tracing::warn!("Config unreadable during key lookup: {e}");
                BecwatchConfig::default()
            }
            Some(Ok(None)) | None => BecwatchConfig::default(),
        };
        config.google_api_key()
    }
}
