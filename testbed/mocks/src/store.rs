//! Durable store double with write faults and a write hook

use gen_jewels_core::{DurableStore, JewelsError, MemoryStore, StorageKey};
use std::sync::Mutex;

type WriteHook = Box<dyn Fn(&[(StorageKey, String)]) + Send + Sync>;

/// `MemoryStore` that can be told to reject writes, or to run a callback
/// just before each `set_many` is applied
#[derive(Default)]
pub struct HookedStore {
    inner: MemoryStore,
    fail_writes: Mutex<bool>,
    before_set: Mutex<Option<WriteHook>>,
}

impl HookedStore {
    pub fn with_entries(entries: &[(StorageKey, &str)]) -> Self {
        Self {
            inner: MemoryStore::with_entries(entries),
            ..Default::default()
        }
    }

    /// Make every `set_many` and `remove_many` fail until cleared
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn on_set_many<F>(&self, hook: F)
    where
        F: Fn(&[(StorageKey, String)]) + Send + Sync + 'static,
    {
        *self.before_set.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn check_writable(&self) -> Result<(), JewelsError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(JewelsError::StorageError("disk full".to_string()));
        }
        Ok(())
    }
}

impl DurableStore for HookedStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, JewelsError> {
        self.inner.get(key)
    }

    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), JewelsError> {
        if let Some(hook) = self.before_set.lock().unwrap().as_ref() {
            hook(entries);
        }
        self.check_writable()?;
        self.inner.set_many(entries)
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<(), JewelsError> {
        self.check_writable()?;
        self.inner.remove_many(keys)
    }
}
