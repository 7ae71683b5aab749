//! History poll that recovers a generation whose response was lost
//!
//! The poll holds only a weak reference to the manager, so dropping the last
//! manager handle ends it. The overall timeout wraps the entire loop and wins
//! over a fetch that never returns.

use std::sync::Weak;

use chrono::Utc;
use gen_jewels_client::DesignRecord;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::manager::Inner;

enum PollOutcome {
    Found(DesignRecord, Vec<DesignRecord>),
    Unauthorized,
    /// Cancelled, superseded, logged out or the manager went away
    Stopped,
}

pub(crate) async fn run(inner: Weak<Inner>, epoch: u64, cancel: CancellationToken) {
    let Some(timings) = inner.upgrade().map(|i| i.timings) else {
        return;
    };

    let outcome = time::timeout(timings.recovery_timeout, poll(&inner, epoch, &cancel)).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    match outcome {
        Ok(PollOutcome::Found(record, feed)) => {
            log::info!("Recovered design {} from history", record.id);
            inner.complete(Some(epoch), record, Some(feed));
        }
        Ok(PollOutcome::Unauthorized) => {
            inner.abandon_recovery(epoch, "credential rejected by the backend");
        }
        Ok(PollOutcome::Stopped) => {}
        Err(_) => {
            inner.abandon_recovery(
                epoch,
                &format!("no result after {}s", timings.recovery_timeout.as_secs()),
            );
        }
    }
}

async fn poll(inner: &Weak<Inner>, epoch: u64, cancel: &CancellationToken) -> PollOutcome {
    let Some(timings) = inner.upgrade().map(|i| i.timings) else {
        return PollOutcome::Stopped;
    };

    // First check one interval after start
    let mut ticker = time::interval_at(Instant::now() + timings.poll_interval, timings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Stopped,
            _ = ticker.tick() => {}
        }

        // Re-check on every tick; the session may have moved on while waiting
        let (api, token) = {
            let Some(inner) = inner.upgrade() else {
                return PollOutcome::Stopped;
            };
            if !inner.recovery_active(epoch) {
                return PollOutcome::Stopped;
            }
            let Some(token) = inner.auth.token() else {
                return PollOutcome::Stopped;
            };
            (inner.api.clone(), token)
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Stopped,
            result = api.history(&token) => result,
        };

        match result {
            Ok(feed) => {
                let Some(newest) = feed.first() else {
                    log::debug!("History is empty, still waiting");
                    continue;
                };
                let now = Utc::now();
                if newest.is_recent(now, timings.recency_window) {
                    return PollOutcome::Found(newest.clone(), feed);
                }
                log::debug!(
                    "Newest design {} is {}s old, still waiting",
                    newest.id,
                    newest.age(now).num_seconds()
                );
            }
            Err(err) if err.is_unauthorized() => return PollOutcome::Unauthorized,
            Err(err) => log::warn!("Recovery poll failed: {}", err),
        }
    }
}
