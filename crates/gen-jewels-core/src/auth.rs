//! Bearer token holder
//!
//! The token lives in the durable store so a restarted client is still logged
//! in; an in-memory copy avoids touching the store on every request.

use std::sync::{Arc, Mutex};

use crate::errors::JewelsError;
use crate::storage::{DurableStore, StorageKey};

pub struct AuthSessionStore {
    store: Arc<dyn DurableStore>,
    token: Mutex<Option<String>>,
}

impl AuthSessionStore {
    /// Build a holder and load any token left by a previous run
    pub fn restore(store: Arc<dyn DurableStore>) -> Result<Self, JewelsError> {
        let token = store
            .get(StorageKey::Token)?
            .filter(|t| !t.trim().is_empty());
        if token.is_some() {
            log::debug!("Restored saved credentials");
        }
        Ok(Self {
            store,
            token: Mutex::new(token),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Current token, or `NotAuthenticated`
    pub fn require_token(&self) -> Result<String, JewelsError> {
        self.token().ok_or(JewelsError::NotAuthenticated)
    }

    pub fn set_token(&self, token: &str) -> Result<(), JewelsError> {
        self.store.set(StorageKey::Token, token.to_string())?;
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    /// Forget the in-memory copy only; the caller removes the durable key
    pub(crate) fn forget(&self) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
    }
}

impl std::fmt::Debug for AuthSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_restore_picks_up_saved_token() {
        let store = Arc::new(MemoryStore::with_entries(&[(StorageKey::Token, "saved")]));
        let auth = AuthSessionStore::restore(store).unwrap();
        assert_eq!(auth.token().as_deref(), Some("saved"));
    }

    #[test]
    fn test_blank_token_is_not_authenticated() {
        let store = Arc::new(MemoryStore::with_entries(&[(StorageKey::Token, "  ")]));
        let auth = AuthSessionStore::restore(store).unwrap();
        assert!(!auth.is_authenticated());
        assert!(matches!(auth.require_token(), Err(JewelsError::NotAuthenticated)));
    }

    #[test]
    fn test_set_writes_through_and_forget_is_memory_only() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthSessionStore::restore(store.clone()).unwrap();

        auth.set_token("fresh").unwrap();
        assert_eq!(store.get(StorageKey::Token).unwrap().as_deref(), Some("fresh"));

        auth.forget();
        assert!(!auth.is_authenticated());
        assert_eq!(store.get(StorageKey::Token).unwrap().as_deref(), Some("fresh"));
    }
}
