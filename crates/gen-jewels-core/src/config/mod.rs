//! Configuration for the generation client
//!
//! Settings come from a YAML file (by default `<config dir>/gen-jewels/config.yaml`)
//! with a handful of environment overrides layered on top.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::JewelsError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<JewelsConfig, JewelsError> {
    ConfigLoader::from_file(path).await
}
