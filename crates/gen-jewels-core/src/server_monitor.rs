//! Backend liveness probe
//!
//! Checks `/health` right away and then on a fixed interval, publishing the
//! result through a watch channel. Generation commands consult it before
//! touching the session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gen_jewels_client::InferenceApi;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthConfig;
use crate::polling::PollingTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Live,
    Offline,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Checking => f.write_str("checking"),
            ServerStatus::Live => f.write_str("live"),
            ServerStatus::Offline => f.write_str("offline"),
        }
    }
}

pub struct ServerMonitor {
    api: Arc<dyn InferenceApi>,
    interval: Duration,
    timeout: Duration,
    status: watch::Sender<ServerStatus>,
}

impl ServerMonitor {
    pub fn new(api: Arc<dyn InferenceApi>, config: &HealthConfig) -> Self {
        Self::with_timings(api, config.interval(), config.timeout())
    }

    pub fn with_timings(api: Arc<dyn InferenceApi>, interval: Duration, timeout: Duration) -> Self {
        let (status, _) = watch::channel(ServerStatus::Checking);
        Self {
            api,
            interval,
            timeout,
            status,
        }
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Probe once and publish the result
    pub async fn check(&self) -> ServerStatus {
        let status = match time::timeout(self.timeout, self.api.health_check()).await {
            Ok(Ok(())) => ServerStatus::Live,
            Ok(Err(e)) => {
                log::debug!("Health check failed: {}", e);
                ServerStatus::Offline
            }
            Err(_) => {
                log::debug!("Health check timed out after {:?}", self.timeout);
                ServerStatus::Offline
            }
        };

        let previous = self.status.send_replace(status);
        if previous != status {
            log::info!("Backend is {}", status);
        }
        status
    }

    /// Probe now and then every interval until the returned task is dropped
    pub fn spawn(self: Arc<Self>) -> PollingTask {
        PollingTask::spawn(move |cancel| async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                self.check().await;
            }
        })
    }
}

impl fmt::Debug for ServerMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerMonitor")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("status", &self.status())
            .finish()
    }
}
