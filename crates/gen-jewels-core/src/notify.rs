//! User-facing notifications
//!
//! The session core raises short status messages (a persistent "crafting"
//! indicator, success and failure toasts) through [`NotificationSink`]. A loading
//! notification stays up until it is dismissed by id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn loading(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Loading, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Info, message: message.into() }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> NotificationId;

    /// Remove a notification; unknown ids are ignored
    fn dismiss(&self, id: NotificationId);
}

/// Messages shown by the session core
pub mod messages {
    pub const LOGIN_REQUIRED: &str = "Please login to generate.";
    pub const CRAFTING: &str = "AI is crafting your jewelry... (Safe to Refresh)";
    pub const RESUMING: &str = "Resuming checks for your design...";
    pub const DESIGN_READY: &str = "Design Ready!";
    pub const GENERATION_FAILED: &str = "Generation Failed.";
    pub const ENDPOINT_NOT_FOUND: &str = "Endpoint not found (404). Please verify backend routes.";
    pub const SERVER_OFFLINE: &str = "AI Server is Offline";
}

/// Sink that writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        match notification.kind {
            NotificationKind::Error => log::error!("{} {}", id, notification.message),
            NotificationKind::Loading => log::info!("{} (pending) {}", id, notification.message),
            _ => log::info!("{} {}", id, notification.message),
        }
        id
    }

    fn dismiss(&self, id: NotificationId) {
        log::debug!("Dismissed notification {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_issues_distinct_ids() {
        let notifier = LogNotifier::new();
        let first = notifier.notify(Notification::loading(messages::CRAFTING));
        let second = notifier.notify(Notification::success(messages::DESIGN_READY));
        assert_ne!(first, second);
        notifier.dismiss(first);
    }
}
