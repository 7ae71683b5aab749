//! The generation session manager
//!
//! One manager exists per process. It owns the single generation slot shared by
//! every page, writes the in-flight marker through to durable storage so a
//! restarted client can pick the session back up, and runs the history poll
//! that recovers a result whose response was lost.
//!
//! State lives behind a `std::sync::Mutex` that is only held for short
//! synchronous sections; every backend call happens with the lock released.
//! Durable marker writes happen under that lock together with the phase
//! change they belong to, so storage never disagrees with memory.
//! Each started, completed or torn-down session bumps an epoch so a response
//! or poll tick that outlives its session is recognised and dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use gen_jewels_client::{
    ApiError, DesignRecord, DesignRequest, GenerateResponse, ImageToImageRequest, InferenceApi,
    LoginRequest, RegisterRequest,
};
use tokio::sync::watch;

use super::recovery;
use super::state::{PageId, SessionPhase, SessionSnapshot, SessionState};
use crate::auth::AuthSessionStore;
use crate::config::SessionTimings;
use crate::errors::JewelsError;
use crate::notify::{messages, Notification, NotificationId, NotificationSink};
use crate::polling::PollingTask;
use crate::storage::{DurableStore, StorageKey};

/// Request parameters for one generation
#[derive(Debug, Clone)]
pub enum GenerationParams {
    /// JSON body, used by the wizard and text pages
    Structured(DesignRequest),
    /// Multipart upload with a reference image
    ImageGuided(ImageToImageRequest),
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        match self {
            GenerationParams::Structured(request) => request.validate(),
            GenerationParams::ImageGuided(request) => request.validate(),
        }
    }
}

impl From<DesignRequest> for GenerationParams {
    fn from(request: DesignRequest) -> Self {
        GenerationParams::Structured(request)
    }
}

impl From<ImageToImageRequest> for GenerationParams {
    fn from(request: ImageToImageRequest) -> Self {
        GenerationParams::ImageGuided(request)
    }
}

/// What a call to [`GenerationSessionManager::recover_pending_generation`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStart {
    NotAuthenticated,
    NothingPending,
    AlreadyRecovering(PageId),
    /// A request issued by this process is still outstanding
    InFlight(PageId),
    Started(PageId),
}

pub(crate) struct Inner {
    pub(crate) api: Arc<dyn InferenceApi>,
    store: Arc<dyn DurableStore>,
    pub(crate) auth: AuthSessionStore,
    notifier: Arc<dyn NotificationSink>,
    pub(crate) timings: SessionTimings,
    state: Mutex<SessionState>,
    poller: Mutex<Option<PollingTask>>,
    updates: watch::Sender<SessionSnapshot>,
}

#[derive(Clone)]
pub struct GenerationSessionManager {
    inner: Arc<Inner>,
}

impl GenerationSessionManager {
    /// Build a manager, restoring the credential and any in-flight marker left
    /// in `store` by a previous process.
    pub fn new(
        api: Arc<dyn InferenceApi>,
        store: Arc<dyn DurableStore>,
        notifier: Arc<dyn NotificationSink>,
        timings: SessionTimings,
    ) -> Result<Self, JewelsError> {
        let auth = AuthSessionStore::restore(store.clone())?;

        let mut state = SessionState::default();
        if let Some(page) = read_pending_page(store.as_ref())? {
            log::info!("Found an unfinished generation for the {} page", page);
            state.phase = SessionPhase::Generating(page);
        }

        let (updates, _) = watch::channel(state.snapshot(auth.is_authenticated()));

        Ok(Self {
            inner: Arc::new(Inner {
                api,
                store,
                auth,
                notifier,
                timings,
                state: Mutex::new(state),
                poller: Mutex::new(None),
                updates,
            }),
        })
    }

    pub fn timings(&self) -> SessionTimings {
        self.inner.timings
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.auth.is_authenticated()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match self.inner.lock_state() {
            Ok(state) => state.snapshot(self.is_authenticated()),
            Err(_) => self.inner.updates.borrow().clone(),
        }
    }

    /// Receive a fresh [`SessionSnapshot`] after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Whether a recovery poll is currently running
    pub fn is_polling(&self) -> bool {
        let recovering = self
            .inner
            .lock_state()
            .map(|s| matches!(s.phase, SessionPhase::Recovering(_)))
            .unwrap_or(false);
        recovering
            && self
                .inner
                .poller
                .lock()
                .map(|slot| slot.as_ref().is_some_and(PollingTask::is_active))
                .unwrap_or(false)
    }

    /// Called when `page` is shown. Returns false when another page owns the
    /// running generation; the session itself is left untouched.
    pub fn register_page(&self, page: PageId) -> bool {
        let Ok(state) = self.inner.lock_state() else {
            return false;
        };
        match state.phase.owner() {
            Some(owner) if owner != page => {
                log::debug!("{} page mounted while {} owns the session", page, owner);
                false
            }
            _ => true,
        }
    }

    /// Called when `page` goes away. Never cancels the session.
    pub fn unregister_page(&self, page: PageId) {
        if let Some(owner) = self.snapshot().owning_page() {
            log::debug!("{} page left; {} generation keeps running", page, owner);
        }
    }

    pub fn can_generate(&self, page: PageId) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.inner
            .lock_state()
            .map(|s| s.phase.owner().map_or(true, |owner| owner == page))
            .unwrap_or(false)
    }

    /// Run one generation for `page` and wait for its outcome.
    ///
    /// Transient failures (timeouts, dropped connections) leave the session
    /// marked as generating so a later [`resume`](Self::resume) can recover the
    /// result from the history feed. If the session is torn down while the
    /// request is outstanding, the result is returned but not applied.
    pub async fn start_generation(
        &self,
        page: PageId,
        params: GenerationParams,
    ) -> Result<DesignRecord, JewelsError> {
        let Some(token) = self.inner.auth.token() else {
            self.inner.notify(Notification::error(messages::LOGIN_REQUIRED));
            return Err(JewelsError::NotAuthenticated);
        };

        let (epoch, stale_notification) = {
            let mut state = self.inner.lock_state()?;
            let phase = state.phase;
            match phase {
                SessionPhase::Idle => {}
                SessionPhase::Generating(owner) if owner == page => {
                    log::debug!("{} page restarted its own generation", page);
                }
                SessionPhase::Generating(owner) | SessionPhase::Recovering(owner) => {
                    drop(state);
                    log::warn!("Rejected generation on {}: {} owns the session", page, owner);
                    self.inner.notify(Notification::error(format!(
                        "Generation already in progress on the {} page",
                        owner.display_name()
                    )));
                    return Err(JewelsError::SessionBusy { owner });
                }
            }

            params.validate()?;
            // The marker must be on disk before the request leaves
            if let Err(err) = self.inner.persist_in_flight(page) {
                drop(state);
                log::error!("Not starting generation, could not save session: {}", err);
                self.inner.notify(Notification::error(messages::GENERATION_FAILED));
                return Err(err);
            }

            state.phase = SessionPhase::Generating(page);
            state.latest_result = None;
            state.request_in_flight = true;
            let epoch = state.next_epoch();
            let stale = state.pending_notification.take();
            self.inner.publish(&state);
            (epoch, stale)
        };

        if let Some(id) = stale_notification {
            self.inner.notifier.dismiss(id);
        }
        let loading = self.inner.notify(Notification::loading(messages::CRAFTING));
        self.inner.attach_notification(epoch, loading);

        log::info!("Starting generation on the {} page", page);
        let result = match &params {
            GenerationParams::Structured(request) => self.inner.api.generate(&token, request).await,
            GenerationParams::ImageGuided(request) => {
                self.inner.api.generate_from_image(&token, request).await
            }
        };

        match result {
            Ok(response) => {
                if !self.inner.is_current(epoch) {
                    log::info!("Discarding result of a generation that was reset while in flight");
                    return Ok(DesignRecord::provisional(&response, Utc::now()));
                }
                let (record, feed) = self.resolve_record(&token, &response).await;
                self.inner.complete(Some(epoch), record.clone(), feed);
                Ok(record)
            }
            Err(err) => {
                self.inner.fail_generation(epoch, &err);
                Err(err.into())
            }
        }
    }

    /// Find the history entry the backend wrote for `response`
    async fn resolve_record(
        &self,
        token: &str,
        response: &GenerateResponse,
    ) -> (DesignRecord, Option<Vec<DesignRecord>>) {
        match self.inner.api.history(token).await {
            Ok(feed) => {
                let found = feed.iter().find(|r| r.has_image(&response.image_url)).cloned();
                let record = found.unwrap_or_else(|| {
                    log::debug!("Generated image {} not yet in history", response.image_url);
                    DesignRecord::provisional(response, Utc::now())
                });
                (record, Some(feed))
            }
            Err(err) => {
                log::warn!("Could not look up the new design in history: {}", err);
                (DesignRecord::provisional(response, Utc::now()), None)
            }
        }
    }

    /// Apply a finished design: it becomes the visible result and is added to
    /// history unless already present. Stops any running recovery.
    pub fn complete_generation(&self, record: DesignRecord) {
        self.inner.stop_poller();
        self.inner.complete(None, record, None);
    }

    /// Start polling history for a generation a previous process left behind.
    /// Calling it again while a poll is running does nothing.
    pub fn recover_pending_generation(&self) -> Result<RecoveryStart, JewelsError> {
        if !self.is_authenticated() {
            return Ok(RecoveryStart::NotAuthenticated);
        }

        let (page, epoch, stale_notification) = {
            let mut state = self.inner.lock_state()?;
            let phase = state.phase;
            match phase {
                SessionPhase::Recovering(page) => return Ok(RecoveryStart::AlreadyRecovering(page)),
                SessionPhase::Generating(page) if state.request_in_flight => {
                    return Ok(RecoveryStart::InFlight(page))
                }
                _ => {}
            }

            let Some(page) = read_pending_page(self.inner.store.as_ref())? else {
                if let SessionPhase::Generating(page) = phase {
                    // Marker vanished underneath us; nothing left to recover
                    log::warn!("Dropping stale generating state for the {} page", page);
                    state.phase = SessionPhase::Idle;
                    state.next_epoch();
                    self.inner.publish(&state);
                }
                return Ok(RecoveryStart::NothingPending);
            };

            state.phase = SessionPhase::Recovering(page);
            let epoch = state.next_epoch();
            let stale = state.pending_notification.take();
            self.inner.publish(&state);
            (page, epoch, stale)
        };

        if let Some(id) = stale_notification {
            self.inner.notifier.dismiss(id);
        }
        log::info!("Resuming checks for a {} page design", page);
        let resume = self.inner.notify(Notification::loading(messages::RESUMING));
        self.inner.attach_notification(epoch, resume);

        let weak = Arc::downgrade(&self.inner);
        let task = PollingTask::spawn(move |cancel| recovery::run(weak, epoch, cancel));
        if let Ok(mut slot) = self.inner.poller.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.stop();
            }
        }

        Ok(RecoveryStart::Started(page))
    }

    /// Stop an active recovery without discarding the in-flight marker, so a
    /// later [`resume`](Self::resume) can try again. Returns false when no
    /// recovery was running.
    pub fn cancel_recovery(&self) -> bool {
        self.inner.stop_poller();

        let dismissed = {
            let Ok(mut state) = self.inner.lock_state() else {
                return false;
            };
            let SessionPhase::Recovering(page) = state.phase else {
                return false;
            };
            state.phase = SessionPhase::Generating(page);
            state.next_epoch();
            let dismissed = state.pending_notification.take();
            self.inner.publish(&state);
            log::info!("Recovery for the {} page cancelled", page);
            dismissed
        };

        if let Some(id) = dismissed {
            self.inner.notifier.dismiss(id);
        }
        true
    }

    /// Clear the visible result. Refused (returns false) while a generation
    /// is outstanding.
    pub fn reset_design(&self, page: PageId) -> bool {
        let Ok(mut state) = self.inner.lock_state() else {
            return false;
        };
        if state.phase.is_generating() {
            log::debug!("Ignoring reset from the {} page while generating", page);
            return false;
        }
        state.latest_result = None;
        self.inner.publish(&state);
        true
    }

    /// Refresh the history cache. On failure the cache is left as it was.
    pub async fn fetch_history(&self) -> Result<Vec<DesignRecord>, JewelsError> {
        let token = self.inner.auth.require_token()?;
        match self.inner.api.history(&token).await {
            Ok(records) => {
                let mut state = self.inner.lock_state()?;
                state.history.replace(records);
                self.inner.publish(&state);
                Ok(state.history.records().to_vec())
            }
            Err(err) => {
                log::error!("Could not fetch history: {}", err);
                Err(err.into())
            }
        }
    }

    /// Log in, store the credential and run [`resume`](Self::resume)
    pub async fn login(&self, username: &str, password: &str) -> Result<RecoveryStart, JewelsError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let token = self.inner.api.login(&request).await?;
        {
            let state = self.inner.lock_state()?;
            self.inner.auth.set_token(&token.access_token)?;
            self.inner.publish(&state);
        }
        log::info!("Logged in as {}", username);
        self.resume().await
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), JewelsError> {
        self.inner.api.register(request).await?;
        log::info!("Registered user {}", request.username);
        Ok(())
    }

    /// Start of an authenticated session: refresh history, then pick up any
    /// generation left pending by an earlier run.
    pub async fn resume(&self) -> Result<RecoveryStart, JewelsError> {
        if !self.is_authenticated() {
            return Ok(RecoveryStart::NotAuthenticated);
        }
        // History failures are log-only here
        let _ = self.fetch_history().await;
        self.recover_pending_generation()
    }

    /// Tear everything down: stop polling, forget the session and remove the
    /// in-flight marker and the credential from durable storage in one step.
    /// Applies even while a generation is outstanding.
    pub fn logout(&self) -> Result<(), JewelsError> {
        self.inner.stop_poller();

        let (dismissed, removed) = {
            let mut state = self.inner.lock_state()?;
            state.phase = SessionPhase::Idle;
            state.latest_result = None;
            state.history.clear();
            state.request_in_flight = false;
            state.next_epoch();
            let dismissed = state.pending_notification.take();
            self.inner.auth.forget();
            let removed = self.inner.store.remove_many(&[
                StorageKey::IsGenerating,
                StorageKey::OwningPage,
                StorageKey::Token,
            ]);
            self.inner.publish(&state);
            (dismissed, removed)
        };

        if let Some(id) = dismissed {
            self.inner.notifier.dismiss(id);
        }
        removed?;
        log::info!("Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for GenerationSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("GenerationSessionManager")
            .field("phase", &snapshot.phase)
            .field("authenticated", &snapshot.authenticated)
            .field("history", &snapshot.history.len())
            .finish()
    }
}

/// Page recorded by the durable in-flight marker, if the marker is set
fn read_pending_page(store: &dyn DurableStore) -> Result<Option<PageId>, JewelsError> {
    if store.get(StorageKey::IsGenerating)?.as_deref() != Some("true") {
        return Ok(None);
    }

    let page = match store.get(StorageKey::OwningPage)? {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Unreadable owning page '{}', assuming wizard", raw);
            PageId::Wizard
        }),
        None => PageId::Wizard,
    };
    Ok(Some(page))
}

impl Inner {
    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, JewelsError> {
        self.state
            .lock()
            .map_err(|_| JewelsError::StorageError("session state lock poisoned".to_string()))
    }

    fn publish(&self, state: &SessionState) {
        self.updates
            .send_replace(state.snapshot(self.auth.is_authenticated()));
    }

    fn notify(&self, notification: Notification) -> NotificationId {
        self.notifier.notify(notification)
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.lock_state().map(|s| s.epoch == epoch).unwrap_or(false)
    }

    /// Remember `id` as the session's pending notification, or dismiss it
    /// straight away if the session already moved on.
    fn attach_notification(&self, epoch: u64, id: NotificationId) {
        let attached = match self.lock_state() {
            Ok(mut state) if state.epoch == epoch && state.pending_notification.is_none() => {
                state.pending_notification = Some(id);
                true
            }
            _ => false,
        };
        if !attached {
            self.notifier.dismiss(id);
        }
    }

    /// Write the in-flight marker. Call with the state lock held.
    fn persist_in_flight(&self, page: PageId) -> Result<(), JewelsError> {
        self.store.set_many(&[
            (StorageKey::IsGenerating, "true".to_string()),
            (StorageKey::OwningPage, page.as_str().to_string()),
        ])
    }

    /// Remove the in-flight marker. Call with the state lock held.
    fn clear_in_flight(&self) {
        if let Err(e) = self
            .store
            .remove_many(&[StorageKey::IsGenerating, StorageKey::OwningPage])
        {
            log::error!("Failed to clear generating state: {}", e);
        }
    }

    fn stop_poller(&self) {
        if let Ok(mut slot) = self.poller.lock() {
            if let Some(task) = slot.take() {
                task.stop();
            }
        }
    }

    /// Shared completion path. With `epoch` set, the record is only applied if
    /// that session is still the current one.
    pub(crate) fn complete(
        &self,
        epoch: Option<u64>,
        record: DesignRecord,
        feed: Option<Vec<DesignRecord>>,
    ) {
        let dismissed = {
            let Ok(mut state) = self.lock_state() else {
                return;
            };
            if epoch.is_some_and(|e| e != state.epoch) {
                log::debug!("Ignoring completion for a superseded session");
                return;
            }

            if let Some(feed) = feed {
                state.history.replace(feed);
            }
            if state.history.prepend_if_new(record.clone()) {
                log::debug!("Added design {} to history", record.id);
            }
            state.latest_result = Some(record.clone());
            state.phase = SessionPhase::Idle;
            state.request_in_flight = false;
            state.next_epoch();
            self.clear_in_flight();
            let dismissed = state.pending_notification.take();
            self.publish(&state);
            dismissed
        };

        if let Some(id) = dismissed {
            self.notifier.dismiss(id);
        }
        log::info!("Design {} ready", record.id);
        self.notify(Notification::success(messages::DESIGN_READY));
    }

    fn fail_generation(&self, epoch: u64, err: &ApiError) {
        let (dismissed, terminal) = {
            let Ok(mut state) = self.lock_state() else {
                return;
            };
            if state.epoch != epoch {
                log::debug!("Ignoring failure for a superseded session: {}", err);
                return;
            }

            state.request_in_flight = false;
            let dismissed = state.pending_notification.take();
            let terminal = !err.is_transient();
            if terminal {
                state.phase = SessionPhase::Idle;
                state.next_epoch();
                self.clear_in_flight();
            }
            self.publish(&state);
            (dismissed, terminal)
        };

        if let Some(id) = dismissed {
            self.notifier.dismiss(id);
        }

        if !terminal {
            log::warn!(
                "Generation request interrupted ({}); keeping the session for recovery",
                err
            );
            return;
        }

        log::error!("Generation failed: {}", err);
        let message = if err.is_not_found() {
            messages::ENDPOINT_NOT_FOUND
        } else {
            messages::GENERATION_FAILED
        };
        self.notify(Notification::error(message));
    }

    /// End a recovery without a result. Used for the timeout and for a
    /// rejected credential; neither success nor failure is reported.
    pub(crate) fn abandon_recovery(&self, epoch: u64, reason: &str) {
        let dismissed = {
            let Ok(mut state) = self.lock_state() else {
                return;
            };
            if state.epoch != epoch || !matches!(state.phase, SessionPhase::Recovering(_)) {
                return;
            }
            state.phase = SessionPhase::Idle;
            state.next_epoch();
            self.clear_in_flight();
            let dismissed = state.pending_notification.take();
            self.publish(&state);
            dismissed
        };

        log::warn!("Stopped checking for a pending design: {}", reason);
        if let Some(id) = dismissed {
            self.notifier.dismiss(id);
        }
    }

    /// Whether a poll tick for `epoch` should still run
    pub(crate) fn recovery_active(&self, epoch: u64) -> bool {
        self.auth.is_authenticated()
            && self
                .lock_state()
                .map(|s| s.epoch == epoch && matches!(s.phase, SessionPhase::Recovering(_)))
                .unwrap_or(false)
    }
}
