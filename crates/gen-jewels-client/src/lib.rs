//! Client SDK for the Gen Jewels generation backend
//!
//! This crate wraps the backend's REST contract (authentication, structured and
//! image-guided generation, the design history feed and the health probe) behind
//! the [`InferenceApi`] trait. The session core only ever talks to the trait, so
//! the HTTP implementation can be swapped for scripted doubles in tests without
//! touching the state machine that sits on top of it.

use async_trait::async_trait;

pub mod error;
pub mod http_client;
pub mod types;

pub use error::ApiError;
pub use http_client::HttpInferenceClient;
pub use types::*;

/// InferenceApi trait for communicating with the generation backend
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ApiError>;

    /// Create a user and company profile
    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ApiError>;

    /// Submit a structured (wizard or text) generation request
    async fn generate(
        &self,
        token: &str,
        request: &DesignRequest,
    ) -> Result<GenerateResponse, ApiError>;

    /// Submit an image-guided generation request as a multipart upload
    async fn generate_from_image(
        &self,
        token: &str,
        request: &ImageToImageRequest,
    ) -> Result<GenerateResponse, ApiError>;

    /// Fetch the user's design history, newest first
    async fn history(&self, token: &str) -> Result<Vec<DesignRecord>, ApiError>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<(), ApiError>;
}
