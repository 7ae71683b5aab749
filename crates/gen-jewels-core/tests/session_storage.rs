mod common;

use common::wizard_request;
use gen_jewels_core::notify::messages;
use gen_jewels_core::{
    DurableStore, GenerationSessionManager, JewelsError, PageId, SessionPhase, SessionTimings,
    StorageKey,
};
use gen_jewels_test_mocks::{HookedStore, MockFailure, MockInferenceApi, RecordingNotifier};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

fn manager_for(
    api: Arc<MockInferenceApi>,
    store: Arc<HookedStore>,
    notifier: Arc<RecordingNotifier>,
) -> GenerationSessionManager {
    GenerationSessionManager::new(api, store, notifier, SessionTimings::default()).unwrap()
}

#[tokio::test]
async fn test_unsaved_marker_blocks_generation() {
    let api = Arc::new(MockInferenceApi::new());
    api.set_generate_failure(Some(MockFailure::Network));
    let store = Arc::new(HookedStore::with_entries(&[(StorageKey::Token, "tok")]));
    let notifier = Arc::new(RecordingNotifier::new());
    let manager = manager_for(api.clone(), store.clone(), notifier.clone());

    store.set_fail_writes(true);
    let err = manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();

    assert!(matches!(err, JewelsError::StorageError(_)));
    assert_eq!(api.generate_calls(), 0);
    assert_eq!(manager.snapshot().phase, SessionPhase::Idle);
    assert!(!notifier.contains(messages::CRAFTING));
    assert!(notifier.contains(messages::GENERATION_FAILED));
    assert_eq!(store.get(StorageKey::IsGenerating).unwrap(), None);

    // Memory and disk agree after a restart
    let restarted = manager_for(api.clone(), store.clone(), Arc::new(RecordingNotifier::new()));
    assert_eq!(restarted.snapshot().phase, SessionPhase::Idle);

    store.set_fail_writes(false);
    manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();
    assert_eq!(api.generate_calls(), 1);
    assert_eq!(
        manager.snapshot().phase,
        SessionPhase::Generating(PageId::Wizard)
    );
    assert_eq!(store.get(StorageKey::IsGenerating).unwrap().as_deref(), Some("true"));
}

#[tokio::test]
async fn test_logout_racing_marker_write_leaves_nothing_behind() {
    let api = Arc::new(MockInferenceApi::new());
    let store = Arc::new(HookedStore::with_entries(&[(StorageKey::Token, "tok")]));
    let manager = manager_for(api.clone(), store.clone(), Arc::new(RecordingNotifier::new()));

    let target: Arc<OnceLock<GenerationSessionManager>> = Arc::new(OnceLock::new());
    let _ = target.set(manager.clone());
    let logouts: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let target = target.clone();
        let logouts = logouts.clone();
        store.on_set_many(move |entries| {
            if !entries.iter().any(|(key, _)| *key == StorageKey::IsGenerating) {
                return;
            }
            let Some(manager) = target.get().cloned() else {
                return;
            };
            // Logout from another thread while the marker is being written
            logouts
                .lock()
                .unwrap()
                .push(std::thread::spawn(move || manager.logout().unwrap()));
        });
    }

    let result = manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await;
    assert!(result.is_ok());

    let handles: Vec<_> = logouts.lock().unwrap().drain(..).collect();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = manager.snapshot();
    assert!(!snapshot.authenticated);
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.latest_result, None);
    assert_eq!(store.get(StorageKey::IsGenerating).unwrap(), None);
    assert_eq!(store.get(StorageKey::OwningPage).unwrap(), None);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_failed_logout_still_tears_down_memory() {
    let api = Arc::new(MockInferenceApi::new());
    let store = Arc::new(HookedStore::with_entries(&[
        (StorageKey::Token, "tok"),
        (StorageKey::IsGenerating, "true"),
        (StorageKey::OwningPage, "wizard"),
    ]));
    let manager = manager_for(api, store.clone(), Arc::new(RecordingNotifier::new()));

    store.set_fail_writes(true);
    let err = manager.logout().unwrap_err();

    assert!(matches!(err, JewelsError::StorageError(_)));
    assert!(!manager.is_authenticated());
    assert_eq!(manager.snapshot().phase, SessionPhase::Idle);
}
