//! Notification sink that remembers everything it was asked to show

use gen_jewels_core::{Notification, NotificationId, NotificationKind, NotificationSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    next_id: AtomicU64,
    shown: Mutex<Vec<(NotificationId, Notification)>>,
    dismissed: Mutex<Vec<NotificationId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<(NotificationId, Notification)> {
        self.shown.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shown().into_iter().map(|(_, n)| n.message).collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.shown().iter().filter(|(_, n)| n.kind == kind).count()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.shown().iter().any(|(_, n)| n.message == message)
    }

    pub fn is_dismissed(&self, id: NotificationId) -> bool {
        self.dismissed.lock().unwrap().contains(&id)
    }

    /// Loading notifications that are still on screen
    pub fn active_loading(&self) -> Vec<Notification> {
        let dismissed = self.dismissed.lock().unwrap().clone();
        self.shown()
            .into_iter()
            .filter(|(id, n)| n.kind == NotificationKind::Loading && !dismissed.contains(id))
            .map(|(_, n)| n)
            .collect()
    }

    pub fn id_of(&self, message: &str) -> Option<NotificationId> {
        self.shown()
            .into_iter()
            .find(|(_, n)| n.message == message)
            .map(|(id, _)| id)
    }

    pub fn clear(&self) {
        self.shown.lock().unwrap().clear();
        self.dismissed.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.shown.lock().unwrap().push((id, notification));
        id
    }

    fn dismiss(&self, id: NotificationId) {
        self.dismissed.lock().unwrap().push(id);
    }
}
