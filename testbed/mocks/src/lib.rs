//! Consolidated test mocks for the Gen Jewels crates
//!
//! Scripted doubles for the backend API, the notification sink and the durable
//! store, shared by the integration tests of every crate so each one does not
//! grow its own.

pub mod inference;
pub mod notify;
pub mod store;

pub use inference::*;
pub use notify::*;
pub use store::*;
