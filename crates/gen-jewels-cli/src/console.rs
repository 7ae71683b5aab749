//! Notification sink that prints to the terminal

use gen_jewels_core::{Notification, NotificationId, NotificationKind, NotificationSink};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    next_id: AtomicU64,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn render(notification: &Notification) -> String {
    let tag = match notification.kind {
        NotificationKind::Loading => "...",
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
        NotificationKind::Info => "info",
    };
    format!("[{}] {}", tag, notification.message)
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        // stderr keeps stdout clean for command output
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", render(&notification));
        id
    }

    fn dismiss(&self, id: NotificationId) {
        log::trace!("dismissed {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tags_by_kind() {
        assert_eq!(
            render(&Notification::error("Generation Failed.")),
            "[error] Generation Failed."
        );
        assert_eq!(render(&Notification::loading("Working")), "[...] Working");
    }

    #[test]
    fn test_ids_are_unique() {
        let console = ConsoleNotifier::new();
        let a = console.notify(Notification::info("one"));
        let b = console.notify(Notification::info("two"));
        assert_ne!(a, b);
    }
}
