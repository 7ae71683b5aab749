//! Error types for the generation session core
//!
//! Backend failures arrive already classified by the client crate; this layer
//! adds the failures that originate on the client itself (a missing credential,
//! a slot held by another page, persistence and configuration problems).

use gen_jewels_client::ApiError;
use thiserror::Error;

use crate::session::PageId;

#[derive(Error, Debug)]
pub enum JewelsError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Not authenticated: please login to continue")]
    NotAuthenticated,
    #[error("Generation already in progress on the {owner} page")]
    SessionBusy { owner: PageId },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl JewelsError {
    /// The backend call failed in a way that leaves its outcome unknown
    pub fn is_transient(&self) -> bool {
        matches!(self, JewelsError::Api(err) if err.is_transient())
    }
}

impl From<std::io::Error> for JewelsError {
    fn from(err: std::io::Error) -> Self {
        JewelsError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for JewelsError {
    fn from(err: serde_json::Error) -> Self {
        JewelsError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for JewelsError {
    fn from(err: serde_yaml::Error) -> Self {
        JewelsError::ConfigError(err.to_string())
    }
}
