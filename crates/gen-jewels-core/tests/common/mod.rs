#![allow(dead_code)]

use gen_jewels_client::DesignRequest;
use gen_jewels_core::{
    DurableStore, GenerationSessionManager, MemoryStore, SessionSnapshot, SessionTimings,
    StorageKey,
};
use gen_jewels_test_mocks::{MockInferenceApi, RecordingNotifier};
use std::sync::Arc;

pub struct Harness {
    pub api: Arc<MockInferenceApi>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: GenerationSessionManager,
}

impl Harness {
    pub fn new(api: MockInferenceApi, store: MemoryStore) -> Self {
        let api = Arc::new(api);
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = GenerationSessionManager::new(
            api.clone(),
            store.clone(),
            notifier.clone(),
            SessionTimings::default(),
        )
        .unwrap();
        Self {
            api,
            store,
            notifier,
            manager,
        }
    }

    /// Logged-in client with nothing pending
    pub fn logged_in(api: MockInferenceApi) -> Self {
        Self::new(api, MemoryStore::with_entries(&[(StorageKey::Token, "tok")]))
    }

    /// Logged-in client restarted while `page` was generating
    pub fn reloaded(api: MockInferenceApi, page: &str) -> Self {
        Self::new(
            api,
            MemoryStore::with_entries(&[
                (StorageKey::Token, "tok"),
                (StorageKey::IsGenerating, "true"),
                (StorageKey::OwningPage, page),
            ]),
        )
    }

    pub fn durable(&self, key: StorageKey) -> Option<String> {
        self.store.get(key).unwrap()
    }

    pub async fn wait_for<F>(&self, predicate: F)
    where
        F: Fn(&SessionSnapshot) -> bool,
    {
        let mut rx = self.manager.subscribe();
        let _ = rx.wait_for(|s| predicate(s)).await.unwrap();
    }
}

pub fn wizard_request() -> DesignRequest {
    DesignRequest::new("Necklace", "Traditional", "Gold", "Emerald", "Peacock")
}
