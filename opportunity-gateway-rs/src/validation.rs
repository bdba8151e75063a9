//! Gateway Input Validation
//!
//! This module checks transport-level properties of incoming requests
//! (content type, size, JSON shape) before anything reaches the pipeline.
//! Business preconditions are left to the orchestrator.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;

use opportunity_pipeline::Request;

use crate::ErrorResponse;

/// Maximum request payload size (64 KiB)
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Validation error for gateway requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status = match self {
            Self::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                kind: "invalid_request".to_string(),
                retriable: false,
                code: status.as_u16(),
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "Expected content type '{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Parse a dispatch body (`{"action": ..., ...}`) into a pipeline request
pub fn parse_request(body: &[u8]) -> Result<Request, ApiValidationError> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ApiValidationError::PayloadTooLarge(format!(
            "{} bytes exceeds the {} byte limit",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))?;

    if value.get("action").and_then(Value::as_str).is_none() {
        return Err(ApiValidationError::InvalidFormat(
            "Missing required field: action".to_string(),
        ));
    }

    sanitize_json_object(&mut value);

    serde_json::from_value(value).map_err(|e| ApiValidationError::InvalidFormat(e.to_string()))
}

/// Strip NUL and other control characters (except whitespace) from strings
pub fn sanitize_json_object(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.chars().any(|c| c.is_control() && !c.is_whitespace()) {
                *s = s
                    .chars()
                    .filter(|c| !c.is_control() || c.is_whitespace())
                    .collect();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_json_object),
        Value::Object(map) => map.values_mut().for_each(sanitize_json_object),
        _ => {}
    }
}

/// Request size limit layer
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}
