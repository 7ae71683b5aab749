//! Durable key-value storage that survives a process restart
//!
//! The session core keeps exactly three values here: the generating flag, the
//! page that owns the running generation and the bearer token. Writes that
//! belong together go through [`DurableStore::set_many`] and
//! [`DurableStore::remove_many`] so a crash cannot leave the flag set without
//! its owner.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use crate::errors::JewelsError;

/// Keys persisted by the session core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    IsGenerating,
    OwningPage,
    Token,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::IsGenerating => "is_generating",
            StorageKey::OwningPage => "generating_page",
            StorageKey::Token => "token",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait DurableStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, JewelsError>;

    /// Write all entries in one step
    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), JewelsError>;

    /// Remove all keys in one step; missing keys are ignored
    fn remove_many(&self, keys: &[StorageKey]) -> Result<(), JewelsError>;

    fn set(&self, key: StorageKey, value: String) -> Result<(), JewelsError> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: StorageKey) -> Result<(), JewelsError> {
        self.remove_many(&[key])
    }
}
