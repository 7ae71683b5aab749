use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use gen_jewels_client::{DesignId, DesignRecord};
use serde::{Deserialize, Serialize};

use crate::errors::JewelsError;
use crate::notify::NotificationId;

/// Pages that can own a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageId {
    Wizard,
    TextToImage,
    ImageToImage,
}

impl PageId {
    pub const ALL: [PageId; 3] = [PageId::Wizard, PageId::TextToImage, PageId::ImageToImage];

    /// Persisted form
    pub fn as_str(&self) -> &'static str {
        match self {
            PageId::Wizard => "wizard",
            PageId::TextToImage => "text-to-image",
            PageId::ImageToImage => "image-to-image",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PageId::Wizard => "Design Wizard",
            PageId::TextToImage => "Text to Image",
            PageId::ImageToImage => "Image to Image",
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageId {
    type Err = JewelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "wizard" => Ok(PageId::Wizard),
            "text-to-image" => Ok(PageId::TextToImage),
            "image-to-image" => Ok(PageId::ImageToImage),
            other => Err(JewelsError::InvalidRequest(format!("unknown page '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "page", rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Generating(PageId),
    Recovering(PageId),
}

impl SessionPhase {
    pub fn is_generating(&self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }

    pub fn owner(&self) -> Option<PageId> {
        match self {
            SessionPhase::Idle => None,
            SessionPhase::Generating(page) | SessionPhase::Recovering(page) => Some(*page),
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => f.write_str("idle"),
            SessionPhase::Generating(page) => write!(f, "generating ({})", page),
            SessionPhase::Recovering(page) => write!(f, "recovering ({})", page),
        }
    }
}

/// Design history, newest first, unique by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryCache {
    records: Vec<DesignRecord>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DesignRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &DesignId) -> bool {
        self.records.iter().any(|r| &r.id == id)
    }

    /// Returns false when a record with the same id is already cached
    pub fn prepend_if_new(&mut self, record: DesignRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.records.insert(0, record);
        true
    }

    /// Replace the cache with a fresh feed, dropping repeated ids
    pub fn replace(&mut self, records: Vec<DesignRecord>) {
        let mut seen = HashSet::new();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Point-in-time view published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub latest_result: Option<DesignRecord>,
    pub history: Vec<DesignRecord>,
    pub authenticated: bool,
}

impl SessionSnapshot {
    pub fn is_generating(&self) -> bool {
        self.phase.is_generating()
    }

    pub fn owning_page(&self) -> Option<PageId> {
        self.phase.owner()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::default(),
            latest_result: None,
            history: Vec::new(),
            authenticated: false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub phase: SessionPhase,
    pub latest_result: Option<DesignRecord>,
    pub history: HistoryCache,
    /// Loading or resume notification still on screen
    pub pending_notification: Option<NotificationId>,
    /// A generation request issued by this process has not returned yet
    pub request_in_flight: bool,
    /// Bumped whenever the session is started, completed or torn down, so a
    /// response that outlives its session can tell it is stale
    pub epoch: u64,
}

impl SessionState {
    pub fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn snapshot(&self, authenticated: bool) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            latest_result: self.latest_result.clone(),
            history: self.history.records().to_vec(),
            authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: i64) -> DesignRecord {
        DesignRecord {
            id: DesignId::from(id),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            image_path: format!("storage/generated_image/design_{id}.png"),
            final_prompt: "a ring".to_string(),
            jewelry_type: None,
            material: None,
            stone: None,
        }
    }

    #[test]
    fn test_page_id_round_trips_through_persisted_form() {
        for page in PageId::ALL {
            assert_eq!(page.as_str().parse::<PageId>().unwrap(), page);
        }
        assert!("gallery".parse::<PageId>().is_err());
        assert_eq!(serde_json::to_string(&PageId::TextToImage).unwrap(), "\"text-to-image\"");
    }

    #[test]
    fn test_prepend_if_new_keeps_ids_unique() {
        let mut cache = HistoryCache::new();
        assert!(cache.prepend_if_new(record(1)));
        assert!(cache.prepend_if_new(record(2)));
        assert!(!cache.prepend_if_new(record(1)));

        let ids: Vec<_> = cache.records().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_replace_drops_duplicate_ids() {
        let mut cache = HistoryCache::new();
        cache.replace(vec![record(3), record(2), record(3)]);
        let ids: Vec<_> = cache.records().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn test_phase_owner() {
        assert_eq!(SessionPhase::Idle.owner(), None);
        assert!(!SessionPhase::Idle.is_generating());
        assert_eq!(
            SessionPhase::Recovering(PageId::Wizard).owner(),
            Some(PageId::Wizard)
        );
        assert_eq!(
            SessionPhase::Generating(PageId::ImageToImage).to_string(),
            "generating (image-to-image)"
        );
    }
}
