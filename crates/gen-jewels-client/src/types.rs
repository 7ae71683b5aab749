use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::ApiError;

/// Opaque design identifier
///
/// The backend uses integer primary keys, but nothing on the client does
/// arithmetic with them, so both integer and string forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DesignId(String);

impl DesignId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for DesignId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for DesignId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for DesignId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => DesignId::from(id),
            RawId::Str(id) => DesignId(id),
        })
    }
}

/// Parse a backend timestamp
///
/// The backend stores `datetime.utcnow()` and serializes it without an offset,
/// so naive timestamps are UTC. Offset-qualified RFC 3339 is accepted as well.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}

mod timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(de::Error::custom)
    }
}

/// Normalize a server-relative image path: forward slashes, no leading slash
pub fn normalize_image_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// A generated design as reported by the history feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub id: DesignId,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub image_path: String,
    pub final_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jewelry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stone: Option<String>,
}

impl DesignRecord {
    /// Build a record from a generation response that the history feed has not
    /// confirmed yet. The normalized image path stands in for the id.
    pub fn provisional(response: &GenerateResponse, created_at: DateTime<Utc>) -> Self {
        let image_path = normalize_image_path(&response.image_url);
        Self {
            id: DesignId::new(image_path.clone()),
            created_at,
            image_path,
            final_prompt: response.final_prompt.clone(),
            jewelry_type: None,
            material: None,
            stone: None,
        }
    }

    /// Time elapsed since creation. Negative when the server clock runs ahead.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }

    pub fn is_recent(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.age(now) < window
    }

    pub fn has_image(&self, path: &str) -> bool {
        normalize_image_path(&self.image_path) == normalize_image_path(path)
    }
}

/// Structured generation request used by the wizard and text pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub jewelry_type: String,
    pub style: String,
    pub material: String,
    pub stone: String,
    pub theme: String,
    pub size: String,
    pub finish: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_text: Option<String>,
}

impl Default for DesignRequest {
    fn default() -> Self {
        Self {
            jewelry_type: String::new(),
            style: String::new(),
            material: String::new(),
            stone: String::new(),
            theme: String::new(),
            size: "Medium".to_string(),
            finish: "High Polish".to_string(),
            extra_text: None,
        }
    }
}

impl DesignRequest {
    /// Create a wizard request with default size and finish
    pub fn new(
        jewelry_type: impl Into<String>,
        style: impl Into<String>,
        material: impl Into<String>,
        stone: impl Into<String>,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            jewelry_type: jewelry_type.into(),
            style: style.into(),
            material: material.into(),
            stone: stone.into(),
            theme: theme.into(),
            ..Default::default()
        }
    }

    /// Free-text request; the prompt travels as `extra_text` over a fixed
    /// attribute set
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            jewelry_type: "Artistic Concept".to_string(),
            style: "Custom".to_string(),
            material: "Mixed".to_string(),
            stone: "None".to_string(),
            theme: "Creative".to_string(),
            size: "Medium".to_string(),
            finish: "Standard".to_string(),
            extra_text: Some(prompt.into()),
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_finish(mut self, finish: impl Into<String>) -> Self {
        self.finish = finish.into();
        self
    }

    pub fn with_extra_text(mut self, extra_text: impl Into<String>) -> Self {
        let extra_text = extra_text.into();
        self.extra_text = if extra_text.trim().is_empty() {
            None
        } else {
            Some(extra_text)
        };
        self
    }

    /// Check that every attribute the wizard requires has been chosen
    pub fn validate(&self) -> Result<(), ApiError> {
        let required = [
            ("jewelry_type", &self.jewelry_type),
            ("style", &self.style),
            ("material", &self.material),
            ("stone", &self.stone),
            ("theme", &self.theme),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "missing required attributes: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }
}

/// Image-guided generation request, sent as multipart form data
#[derive(Clone, PartialEq)]
pub struct ImageToImageRequest {
    pub image: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub jewelry_type: String,
    pub prompt: Option<String>,
    pub strength: Option<f32>,
}

impl ImageToImageRequest {
    pub fn new(image: Vec<u8>, file_name: impl Into<String>, jewelry_type: impl Into<String>) -> Self {
        Self {
            image,
            file_name: file_name.into(),
            content_type: None,
            jewelry_type: jewelry_type.into(),
            prompt: None,
            strength: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Guess a content type from the file extension when none was given
    pub fn resolved_content_type(&self) -> String {
        if let Some(content_type) = &self.content_type {
            return content_type.clone();
        }

        let extension = self
            .file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        }
        .to_string()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.image.is_empty() {
            return Err(ApiError::InvalidRequest("image is empty".to_string()));
        }
        if self.jewelry_type.trim().is_empty() {
            return Err(ApiError::InvalidRequest("jewelry type is required".to_string()));
        }
        if let Some(strength) = self.strength {
            if !(0.0..=1.0).contains(&strength) {
                return Err(ApiError::InvalidRequest(format!(
                    "strength must be between 0 and 1, got {}",
                    strength
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ImageToImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageToImageRequest")
            .field("image", &format!("<{} bytes>", self.image.len()))
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("jewelry_type", &self.jewelry_type)
            .field("prompt", &self.prompt)
            .field("strength", &self.strength)
            .finish()
    }
}

/// Immediate response of both generation endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub image_url: String,
    pub final_prompt: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub owner_name: String,
    pub company_name: String,
    pub address: String,
    pub phone_number: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}
