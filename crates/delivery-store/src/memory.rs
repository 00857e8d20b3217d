//! In-memory store, used by tests and throwaway sessions

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::{KvStore, StoreError, StoreResult, UpdateFn};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> StoreResult<()> {
        let mut entries = self.lock()?;
        match f(entries.get(key).cloned())? {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        if self.entries.is_poisoned() {
            warn!("Store lock poisoned");
            return false;
        }
        true
    }
}
