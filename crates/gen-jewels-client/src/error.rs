//! Error types for backend communication
//!
//! Failures are classified by how the session layer has to react to them rather
//! than by where they came from: an expired credential aborts everything, a
//! missing route is a configuration problem, and a dropped connection or timeout
//! says nothing about whether the server finished the job.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Endpoint not found: {0}")]
    NotFound(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// FastAPI error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ApiError {
    /// Build an error from a non-success status and the raw response body
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::extract_detail(body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            // A server-reported timeout is an answer; only client-side timeouts are transient
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    fn extract_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the request may still be running server-side
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout(_) | ApiError::Network(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::NotFound(_) => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status, "")
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(ApiError::from_status(StatusCode::NOT_FOUND, "").is_not_found());

        let gateway = ApiError::from_status(StatusCode::GATEWAY_TIMEOUT, "");
        assert_eq!(gateway.status(), Some(504));
        assert!(!gateway.is_transient());
        assert!(!ApiError::from_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_detail_is_surfaced() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Incorrect username or password"}"#,
        );
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Incorrect username or password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_body_falls_back_to_reason() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(err.to_string(), "Endpoint not found: Not Found");
    }

    #[test]
    fn test_structured_detail() {
        let err = ApiError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "style"], "msg": "field required"}]}"#,
        );
        assert!(err.to_string().contains("field required"));
    }
}
