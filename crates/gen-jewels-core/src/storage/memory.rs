use std::collections::HashMap;
use std::sync::Mutex;

use super::{DurableStore, StorageKey};
use crate::errors::JewelsError;

/// In-process store, used in tests and when persistence is disabled
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<&'static str, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate entries, as if left behind by an earlier process
    pub fn with_entries(entries: &[(StorageKey, &str)]) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            for (key, value) in entries {
                values.insert(key.as_str(), value.to_string());
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, String>>, JewelsError> {
        self.values
            .lock()
            .map_err(|_| JewelsError::StorageError("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, JewelsError> {
        Ok(self.lock()?.get(key.as_str()).cloned())
    }

    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), JewelsError> {
        let mut values = self.lock()?;
        for (key, value) in entries {
            values.insert(key.as_str(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<(), JewelsError> {
        let mut values = self.lock()?;
        for key in keys {
            values.remove(key.as_str());
        }
        Ok(())
    }
}
