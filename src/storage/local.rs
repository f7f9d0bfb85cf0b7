//! Local filesystem state store.
//!
//! Keeps the mapping as a pretty-printed JSON object with sorted keys, so
//! consecutive runs produce small, readable diffs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::{StateMap, StateStore, write_atomic};

/// JSON file backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Decode stored state, reporting corruption as [`AppError::StateCorrupt`].
    fn decode(&self, bytes: &[u8]) -> Result<StateMap> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::state_corrupt(self.path.display().to_string(), e))
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<StateMap> {
        let Some(bytes) = self.read_bytes().await? else {
            log::info!("No state file at {}; starting fresh", self.path.display());
            return Ok(StateMap::new());
        };

        match self.decode(&bytes) {
            Ok(state) => {
                log::debug!("Loaded {} state entries", state.len());
                Ok(state)
            }
            Err(e) => {
                log::warn!("{}; treating every current item as new", e);
                Ok(StateMap::new())
            }
        }
    }

    async fn save(&self, state: &StateMap) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(state)?;
        bytes.push(b'\n');
        write_atomic(&self.path, &bytes).await?;
        log::debug!("Saved {} state entries to {}", state.len(), self.path.display());
        Ok(())
    }
}
