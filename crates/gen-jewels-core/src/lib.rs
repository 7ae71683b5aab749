//! Generation session core for the Gen Jewels client
//!
//! Every surface that can request a design (the wizard, text-to-image and
//! image-to-image pages) shares one generation slot. This crate owns that slot:
//! it rejects competing requests, persists an in-flight marker so a restarted
//! client knows a design was being crafted, and polls the history feed to
//! recover the result when the original response was lost.

pub mod assets;
pub mod auth;
pub mod config;
pub mod errors;
pub mod notify;
pub mod polling;
pub mod server_monitor;
pub mod session;
pub mod storage;

pub use assets::normalize_asset_url;
pub use auth::AuthSessionStore;
pub use config::{ConfigLoader, JewelsConfig, SessionTimings};
pub use errors::JewelsError;
pub use notify::{LogNotifier, Notification, NotificationId, NotificationKind, NotificationSink};
pub use polling::PollingTask;
pub use server_monitor::{ServerMonitor, ServerStatus};
pub use session::{
    GenerationParams, GenerationSessionManager, PageId, RecoveryStart, SessionPhase,
    SessionSnapshot,
};
pub use storage::{DurableStore, FileStore, MemoryStore, StorageKey};
