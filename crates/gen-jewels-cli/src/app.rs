//! Wiring between configuration, the HTTP client and the session manager

use anyhow::{Context, Result};
use gen_jewels_client::{DesignRecord, HttpInferenceClient, InferenceApi};
use gen_jewels_core::{
    normalize_asset_url, DurableStore, FileStore, GenerationSessionManager, JewelsConfig,
    ServerMonitor, SessionPhase, SessionSnapshot, StorageKey,
};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use crate::console::ConsoleNotifier;

pub struct App {
    pub config: JewelsConfig,
    pub manager: GenerationSessionManager,
    pub monitor: ServerMonitor,
    store: Arc<FileStore>,
}

impl App {
    pub fn build(config: JewelsConfig) -> Result<Self> {
        let client = HttpInferenceClient::new(config.api.base_url.clone())
            .with_timeout(config.api.timeout())
            .with_generation_timeout(config.api.generation_timeout())
            .with_extra_headers(config.api.extra_headers.iter())
            .context("Invalid api.extra_headers")?;
        let api: Arc<dyn InferenceApi> = Arc::new(client);

        let store_path = config.storage.resolved_path()?;
        let store = Arc::new(FileStore::open(&store_path)?);

        let manager = GenerationSessionManager::new(
            api.clone(),
            store.clone(),
            Arc::new(ConsoleNotifier::new()),
            config.session.timings(),
        )?;
        let monitor = ServerMonitor::new(api, &config.health);

        Ok(Self {
            config,
            manager,
            monitor,
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.api.base_url
    }

    /// Raw durable marker, for `status`
    pub fn durable_flag(&self) -> Option<String> {
        self.store.get(StorageKey::IsGenerating).ok().flatten()
    }

    /// Wait until an active recovery resolves one way or the other
    pub async fn wait_for_recovery(&self) -> Result<SessionSnapshot> {
        let mut updates = self.manager.subscribe();
        tokio::select! {
            snapshot = updates.wait_for(|s| !matches!(s.phase, SessionPhase::Recovering(_))) => {
                Ok(snapshot.context("Session manager went away")?.clone())
            }
            _ = tokio::signal::ctrl_c() => {
                self.manager.cancel_recovery();
                anyhow::bail!("Interrupted; the pending design will be checked again next time")
            }
        }
    }

    pub fn describe(&self, record: &DesignRecord) -> String {
        describe_record(self.base_url(), record)
    }
}

pub fn describe_record(base_url: &str, record: &DesignRecord) -> String {
    let mut line = format!(
        "#{}  {}  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        normalize_asset_url(base_url, &record.image_path)
    );
    let attributes: Vec<&str> = [&record.jewelry_type, &record.material, &record.stone]
        .into_iter()
        .filter_map(|a| a.as_deref())
        .collect();
    if !attributes.is_empty() {
        line.push_str(&format!("  ({})", attributes.join(", ")));
    }
    line
}

/// Initialize env_logger at `level`, appending to `file` when given
pub fn init_logging(level: &str, file: Option<&Path>) -> Result<()> {
    let filter = level.parse().unwrap_or(LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter);

    if let Some(path) = file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.try_init().context("Logger already initialized")?;
    Ok(())
}
