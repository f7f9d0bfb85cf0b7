//! In-process state store.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{StateMap, StateStore};

/// [`StateStore`] kept in memory; clones share the same mapping.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<Mutex<StateMap>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StateMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current mapping.
    pub fn snapshot(&self) -> StateMap {
        self.lock().clone()
    }

    /// The mapping is replaced whole on every save, so a panic elsewhere
    /// cannot leave it half-written; a poisoned lock is logged and reused.
    fn lock(&self) -> MutexGuard<'_, StateMap> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("In-memory state lock was poisoned; continuing with last saved state");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<StateMap> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &StateMap) -> Result<()> {
        *self.lock() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStateStore::new();
        let other = store.clone();

        let state = StateMap::from([("OzempX".to_string(), "sig".to_string())]);
        store.save(&state).await.unwrap();

        assert_eq!(other.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_poisoned_lock_still_saves() {
        let store = MemoryStateStore::with_state(StateMap::from([(
            "OzempX".to_string(),
            "old".to_string(),
        )]));
        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.state.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(store.state.is_poisoned());

        assert_eq!(store.snapshot()["OzempX"], "old");
        let state = StateMap::from([("OzempX".to_string(), "new".to_string())]);
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }
}
