//! Mock Gen Jewels backend for testing the HTTP client end to end
//!
//! Serves the same routes as the real backend (auth, structured and multipart
//! generation, history, health) from in-memory state, and records every request
//! it receives so tests can assert on headers, credentials and form fields.

pub mod fixtures;
pub mod handlers;
pub mod server;

pub use fixtures::{BackendFixture, RecordedRequest};
pub use server::{MockBackend, RunningBackend};
