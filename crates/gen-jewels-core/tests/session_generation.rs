mod common;

use common::{wizard_request, Harness};
use gen_jewels_client::{
    ApiError, DesignId, DesignRequest, GenerateResponse, ImageToImageRequest,
};
use gen_jewels_core::notify::messages;
use gen_jewels_core::{
    GenerationParams, JewelsError, MemoryStore, NotificationKind, PageId, RecoveryStart,
    SessionPhase, StorageKey,
};
use gen_jewels_test_mocks::{record_aged, ApiCall, MockFailure, MockInferenceApi};
use std::time::Duration;

#[tokio::test]
async fn test_generation_completes_and_updates_history() {
    let h = Harness::logged_in(MockInferenceApi::new());

    let record = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap();

    assert_eq!(record.id, DesignId::from(1));
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.latest_result.as_ref().map(|r| &r.id), Some(&record.id));
    assert_eq!(snapshot.history.len(), 1);

    assert_eq!(h.durable(StorageKey::IsGenerating), None);
    assert_eq!(h.durable(StorageKey::OwningPage), None);
    assert_eq!(h.durable(StorageKey::Token).as_deref(), Some("tok"));

    let crafting = h.notifier.id_of(messages::CRAFTING).unwrap();
    assert!(h.notifier.is_dismissed(crafting));
    assert!(h.notifier.contains(messages::DESIGN_READY));
}

#[tokio::test]
async fn test_unauthenticated_generation_is_rejected() {
    let h = Harness::new(MockInferenceApi::new(), MemoryStore::new());

    let err = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();

    assert!(matches!(err, JewelsError::NotAuthenticated));
    assert!(h.notifier.contains(messages::LOGIN_REQUIRED));
    assert_eq!(h.api.generate_calls(), 0);
    assert_eq!(h.manager.snapshot().phase, SessionPhase::Idle);
}

#[tokio::test]
async fn test_invalid_request_leaves_session_idle() {
    let h = Harness::logged_in(MockInferenceApi::new());

    let err = h
        .manager
        .start_generation(PageId::Wizard, DesignRequest::default().into())
        .await
        .unwrap_err();

    assert!(matches!(err, JewelsError::Api(ApiError::InvalidRequest(_))));
    assert_eq!(h.manager.snapshot().phase, SessionPhase::Idle);
    assert_eq!(h.durable(StorageKey::IsGenerating), None);
    assert_eq!(h.api.generate_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_competing_page_gets_busy_rejection() {
    let h = Harness::logged_in(MockInferenceApi::new().with_generation_delay(Duration::from_secs(30)));

    let manager = h.manager.clone();
    let running = tokio::spawn(async move {
        manager
            .start_generation(PageId::TextToImage, DesignRequest::from_prompt("a lotus pendant").into())
            .await
    });
    h.wait_for(|s| s.phase == SessionPhase::Generating(PageId::TextToImage)).await;

    assert_eq!(h.durable(StorageKey::IsGenerating).as_deref(), Some("true"));
    assert_eq!(h.durable(StorageKey::OwningPage).as_deref(), Some("text-to-image"));

    let err = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();
    match err {
        JewelsError::SessionBusy { owner } => assert_eq!(owner, PageId::TextToImage),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h
        .notifier
        .contains("Generation already in progress on the Text to Image page"));
    assert_eq!(h.api.generate_calls(), 1);
    assert!(!h.manager.can_generate(PageId::Wizard));
    assert!(h.manager.can_generate(PageId::TextToImage));

    running.await.unwrap().unwrap();
    assert_eq!(h.manager.snapshot().phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_busy_rejection_wins_over_invalid_request() {
    let h = Harness::logged_in(MockInferenceApi::new().with_generation_delay(Duration::from_secs(30)));

    let manager = h.manager.clone();
    let running = tokio::spawn(async move {
        manager
            .start_generation(PageId::Wizard, wizard_request().into())
            .await
    });
    h.wait_for(|s| s.is_generating()).await;

    let empty = ImageToImageRequest::new(Vec::new(), "empty.png", "Ring");
    let err = h
        .manager
        .start_generation(PageId::ImageToImage, empty.into())
        .await
        .unwrap_err();
    assert!(matches!(err, JewelsError::SessionBusy { owner: PageId::Wizard }));

    running.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_navigating_to_another_page_while_generating() {
    let h = Harness::logged_in(MockInferenceApi::new().with_generation_delay(Duration::from_secs(30)));

    assert!(h.manager.register_page(PageId::TextToImage));
    let manager = h.manager.clone();
    let running = tokio::spawn(async move {
        manager
            .start_generation(PageId::TextToImage, DesignRequest::from_prompt("a lotus pendant").into())
            .await
    });
    h.wait_for(|s| s.is_generating()).await;

    // Leaving the page does not cancel the session
    h.manager.unregister_page(PageId::TextToImage);
    assert!(!h.manager.register_page(PageId::ImageToImage));
    assert_eq!(
        h.manager.snapshot().phase,
        SessionPhase::Generating(PageId::TextToImage)
    );

    let record = running.await.unwrap().unwrap();
    assert_eq!(h.manager.snapshot().latest_result, Some(record));
    assert!(h.manager.register_page(PageId::ImageToImage));
}

#[tokio::test(start_paused = true)]
async fn test_owner_may_restart_its_own_generation() {
    let h = Harness::logged_in(MockInferenceApi::new().with_generation_delay(Duration::from_secs(30)));

    let manager = h.manager.clone();
    let first = tokio::spawn(async move {
        manager
            .start_generation(PageId::Wizard, wizard_request().into())
            .await
    });
    h.wait_for(|s| s.is_generating()).await;

    let second = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().with_size("Large").into())
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(h.api.generate_calls(), 2);
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.latest_result.map(|r| r.id), Some(second.id));
}

#[tokio::test]
async fn test_complete_generation_is_idempotent_on_id() {
    let h = Harness::logged_in(MockInferenceApi::new());
    let record = record_aged(42, chrono::Duration::seconds(5));

    h.manager.complete_generation(record.clone());
    h.manager.complete_generation(record.clone());

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.latest_result, Some(record));
    assert_eq!(snapshot.phase, SessionPhase::Idle);
}

#[tokio::test]
async fn test_network_error_keeps_session_for_recovery() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.api.set_generate_failure(Some(MockFailure::Network));

    let err = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(h.manager.snapshot().phase, SessionPhase::Generating(PageId::Wizard));
    assert_eq!(h.durable(StorageKey::IsGenerating).as_deref(), Some("true"));
    assert_eq!(h.durable(StorageKey::OwningPage).as_deref(), Some("wizard"));
    assert_eq!(h.notifier.count(NotificationKind::Error), 0);
    assert!(h.notifier.active_loading().is_empty());
    assert!(!h.manager.register_page(PageId::TextToImage));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_generation_is_recovered_from_history() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.api.set_generate_failure(Some(MockFailure::Timeout));

    h.manager
        .start_generation(PageId::ImageToImage, ImageToImageRequest::new(vec![1, 2, 3], "ref.png", "Ring").into())
        .await
        .unwrap_err();
    assert!(!h.manager.reset_design(PageId::ImageToImage));

    // The backend finished the design after the client gave up
    h.api.add_history_record(record_aged(77, chrono::Duration::seconds(4)));

    assert_eq!(
        h.manager.recover_pending_generation().unwrap(),
        RecoveryStart::Started(PageId::ImageToImage)
    );
    tokio::time::sleep(Duration::from_millis(3100)).await;

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.latest_result.map(|r| r.id), Some(DesignId::from(77)));
    assert_eq!(h.durable(StorageKey::IsGenerating), None);
    assert!(h.manager.reset_design(PageId::ImageToImage));
    assert_eq!(h.manager.snapshot().latest_result, None);
}

#[tokio::test]
async fn test_not_found_is_terminal_with_route_message() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.api.set_generate_failure(Some(MockFailure::NotFound));

    h.manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap_err();

    assert_eq!(h.manager.snapshot().phase, SessionPhase::Idle);
    assert_eq!(h.durable(StorageKey::IsGenerating), None);
    assert!(h.notifier.contains(messages::ENDPOINT_NOT_FOUND));
    assert!(!h.notifier.contains(messages::GENERATION_FAILED));
}

#[tokio::test]
async fn test_server_error_is_terminal() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.api.set_generate_failure(Some(MockFailure::Status(500)));

    let err = h
        .manager
        .start_generation(PageId::TextToImage, DesignRequest::from_prompt("a jade bangle").into())
        .await
        .unwrap_err();

    assert!(!err.is_transient());
    assert_eq!(h.manager.snapshot().phase, SessionPhase::Idle);
    assert_eq!(h.durable(StorageKey::OwningPage), None);
    assert!(h.notifier.contains(messages::GENERATION_FAILED));
    assert!(h.manager.register_page(PageId::Wizard));
}

#[tokio::test]
async fn test_reset_design_clears_result_when_idle() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap();
    assert!(h.manager.snapshot().latest_result.is_some());

    assert!(h.manager.reset_design(PageId::Wizard));
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.latest_result, None);
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_generation_discards_late_result() {
    let h = Harness::logged_in(MockInferenceApi::new().with_generation_delay(Duration::from_secs(30)));

    let manager = h.manager.clone();
    let running = tokio::spawn(async move {
        manager
            .start_generation(PageId::Wizard, wizard_request().into())
            .await
    });
    h.wait_for(|s| s.is_generating()).await;

    h.manager.logout().unwrap();
    assert!(h.store.is_empty());
    assert!(!h.manager.is_authenticated());

    running.await.unwrap().unwrap();
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.latest_result, None);
    assert!(snapshot.history.is_empty());
    assert!(!h.notifier.contains(messages::DESIGN_READY));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_image_guided_generation_uses_multipart_route() {
    let h = Harness::logged_in(MockInferenceApi::new());
    let request = ImageToImageRequest::new(vec![0x89, 0x50], "sketch.png", "Earrings")
        .with_prompt("add pearls")
        .with_strength(0.4);

    let record = h
        .manager
        .start_generation(PageId::ImageToImage, GenerationParams::ImageGuided(request))
        .await
        .unwrap();

    assert_eq!(record.final_prompt, "add pearls");
    assert!(h.api.calls().contains(&ApiCall::GenerateFromImage {
        token: "tok".to_string(),
        jewelry_type: "Earrings".to_string(),
        file_name: "sketch.png".to_string(),
    }));
}

#[tokio::test]
async fn test_result_missing_from_history_gets_provisional_record() {
    let h = Harness::logged_in(MockInferenceApi::new());
    h.api.push_generate_result(Ok(GenerateResponse {
        image_url: "/storage/generated_image/orphan.png".to_string(),
        final_prompt: "an orphaned brooch".to_string(),
        status: "success".to_string(),
    }));

    let record = h
        .manager
        .start_generation(PageId::Wizard, wizard_request().into())
        .await
        .unwrap();

    assert_eq!(record.id.as_str(), "storage/generated_image/orphan.png");
    assert_eq!(record.image_path, "storage/generated_image/orphan.png");
    assert_eq!(h.manager.snapshot().history[0], record);
}

#[tokio::test]
async fn test_fetch_history_failure_keeps_cache() {
    let h = Harness::logged_in(MockInferenceApi::new().with_history(vec![
        record_aged(2, chrono::Duration::minutes(5)),
        record_aged(1, chrono::Duration::minutes(50)),
    ]));

    assert_eq!(h.manager.fetch_history().await.unwrap().len(), 2);

    h.api.push_history_result(Err(MockFailure::Network.to_error()));
    assert!(h.manager.fetch_history().await.is_err());
    assert_eq!(h.manager.snapshot().history.len(), 2);
}

#[tokio::test]
async fn test_fetch_history_requires_login() {
    let h = Harness::new(MockInferenceApi::new(), MemoryStore::new());
    assert!(matches!(
        h.manager.fetch_history().await,
        Err(JewelsError::NotAuthenticated)
    ));
    assert_eq!(h.api.history_calls(), 0);
}

#[tokio::test]
async fn test_login_resumes_pending_generation() {
    let api = MockInferenceApi::new().with_user("meera", "pw");
    let h = Harness::new(
        api,
        MemoryStore::with_entries(&[
            (StorageKey::IsGenerating, "true"),
            (StorageKey::OwningPage, "text-to-image"),
        ]),
    );

    assert_eq!(
        h.manager.snapshot().phase,
        SessionPhase::Generating(PageId::TextToImage)
    );
    assert_eq!(
        h.manager.recover_pending_generation().unwrap(),
        RecoveryStart::NotAuthenticated
    );

    assert!(h.manager.login("meera", "wrong").await.is_err());
    assert!(!h.manager.is_authenticated());

    let start = h.manager.login("meera", "pw").await.unwrap();
    assert_eq!(start, RecoveryStart::Started(PageId::TextToImage));
    assert_eq!(h.durable(StorageKey::Token).as_deref(), Some("token-meera"));
    assert!(h.manager.is_polling());
    assert!(h.notifier.contains(messages::RESUMING));

    h.manager.logout().unwrap();
    assert!(!h.manager.is_polling());
}

#[tokio::test]
async fn test_register_does_not_log_in() {
    let h = Harness::new(MockInferenceApi::new(), MemoryStore::new());
    let request = gen_jewels_client::RegisterRequest {
        owner_name: "Kiran Rao".to_string(),
        company_name: "Rao Gems".to_string(),
        address: "MG Road".to_string(),
        phone_number: "5550111".to_string(),
        username: "kiran".to_string(),
        password: "pw".to_string(),
    };

    h.manager.register(&request).await.unwrap();
    assert!(!h.manager.is_authenticated());
    assert!(h.manager.register(&request).await.is_err());

    h.manager.login("kiran", "pw").await.unwrap();
    assert!(h.manager.is_authenticated());
}
