//! JSON file backed store
//!
//! The whole map is rewritten on every change through a temporary file in the
//! same directory followed by a rename, so readers never observe a partial write.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::{DurableStore, StorageKey};
use crate::errors::JewelsError;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`, creating parent directories as needed.
    /// The file itself is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JewelsError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    JewelsError::StorageError(format!(
                        "failed to create storage directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        log::debug!("Using session store at {}", path.display());
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, JewelsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(JewelsError::StorageError(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupt file is treated as empty; the next write replaces it
                log::warn!(
                    "Ignoring unreadable session store {}: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), JewelsError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
            JewelsError::StorageError(format!("failed to create temporary file: {}", e))
        })?;
        let content = serde_json::to_string_pretty(map)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| {
            JewelsError::StorageError(format!(
                "failed to write {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), JewelsError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| JewelsError::StorageError("file store lock poisoned".to_string()))?;
        let mut map = self.read_map()?;
        apply(&mut map);
        self.write_map(&map)
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, JewelsError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| JewelsError::StorageError("file store lock poisoned".to_string()))?;
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), JewelsError> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert(key.as_str().to_string(), value.clone());
            }
        })
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<(), JewelsError> {
        self.update(|map| {
            for key in keys {
                map.remove(key.as_str());
            }
        })
    }
}
