//! Generation session: the shared slot, its durable marker and recovery

mod manager;
mod recovery;
pub mod state;

pub use manager::{GenerationParams, GenerationSessionManager, RecoveryStart};
pub use state::{HistoryCache, PageId, SessionPhase, SessionSnapshot};
