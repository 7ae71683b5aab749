use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    ApiError, DesignRecord, DesignRequest, GenerateResponse, ImageToImageRequest, InferenceApi,
    LoginRequest, RegisterRequest, TokenResponse,
};

/// HTTP client for communicating with a remote Gen Jewels backend
pub struct HttpInferenceClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    generation_timeout: Duration,
    extra_headers: HeaderMap,
}

impl HttpInferenceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(600),
            extra_headers: HeaderMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generation runs a diffusion model server-side and takes far longer than
    /// any other call
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Static headers attached to every request, e.g. tunnel bypass headers
    pub fn with_extra_headers<I, K, V>(mut self, headers: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(|e| {
                ApiError::InvalidRequest(format!("invalid header name '{}': {}", name.as_ref(), e))
            })?;
            let header_value = HeaderValue::from_str(value.as_ref()).map_err(|e| {
                ApiError::InvalidRequest(format!(
                    "invalid value for header '{}': {}",
                    name.as_ref(),
                    e
                ))
            })?;
            self.extra_headers.insert(header_name, header_value);
        }
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every request goes through here so the extra headers and credential are
    /// applied uniformly
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .headers(self.extra_headers.clone())
            .timeout(timeout);

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("Backend returned {}: {}", status, body);
            return Err(ApiError::from_status(status, &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::Decode(format!("failed to parse response body: {}", e))
        })
    }
}

#[async_trait]
impl InferenceApi for HttpInferenceClient {
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/auth/login", None, self.timeout)
            .json(request);
        Self::send_json(builder).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/auth/register", None, self.timeout)
            .json(request);
        Self::send_json(builder).await
    }

    async fn generate(
        &self,
        token: &str,
        request: &DesignRequest,
    ) -> Result<GenerateResponse, ApiError> {
        log::debug!("Submitting generation for {}", request.jewelry_type);
        let builder = self
            .request(Method::POST, "/generate/", Some(token), self.generation_timeout)
            .json(request);
        Self::send_json(builder).await
    }

    async fn generate_from_image(
        &self,
        token: &str,
        request: &ImageToImageRequest,
    ) -> Result<GenerateResponse, ApiError> {
        log::debug!(
            "Submitting image-to-image generation for {} ({} bytes)",
            request.jewelry_type,
            request.image.len()
        );

        let image_part = Part::bytes(request.image.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.resolved_content_type())?;

        let mut form = Form::new()
            .part("init_image", image_part)
            .text("jewelry_type", request.jewelry_type.clone());

        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(strength) = request.strength {
            form = form.text("strength", strength.to_string());
        }

        let builder = self
            .request(
                Method::POST,
                "/generate/image-to-image",
                Some(token),
                self.generation_timeout,
            )
            .multipart(form);
        Self::send_json(builder).await
    }

    async fn history(&self, token: &str) -> Result<Vec<DesignRecord>, ApiError> {
        let builder = self.request(Method::GET, "/generate/history", Some(token), self.timeout);
        Self::send_json(builder).await
    }

    async fn health_check(&self) -> Result<(), ApiError> {
        let response = self
            .request(Method::GET, "/health", None, self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_status(response.status(), ""));
        }

        Ok(())
    }
}

impl std::fmt::Debug for HttpInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInferenceClient")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("generation_timeout", &self.generation_timeout)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .finish()
    }
}
