//! Error classification for provider failures
//!
//! This module maps low-level failures to `ClassifiedError`. Status codes,
//! transport error types and the provider's machine-readable error codes are
//! the primary signals. Message text is only consulted for opaque errors and
//! those classifications are marked `Confidence::Inferred`.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;

use super::{ClassifiedError, ErrorKind, ProviderError};
use crate::util::truncate_string;

/// Longest provider message carried into a classified error
const MAX_MESSAGE_LEN: usize = 300;

/// Classify a low-level provider failure
pub fn classify(err: ProviderError) -> ClassifiedError {
    match err {
        ProviderError::Transport(err) => classify_transport(&err),
        ProviderError::Status {
            status,
            body,
            retry_after,
        } => classify_status(status, &body).with_retry_after(retry_after),
        ProviderError::Decode { body, source } => ClassifiedError::malformed(
            format!("Provider response could not be decoded: {}", source),
            body,
        ),
        ProviderError::DeadlineElapsed(deadline) => ClassifiedError::timeout(format!(
            "No response from provider within {} ms",
            deadline.as_millis()
        )),
        ProviderError::Opaque(message) => infer_from_message(&message),
    }
}

/// Classify a reqwest transport error by its type
pub fn classify_transport(err: &reqwest::Error) -> ClassifiedError {
    if err.is_timeout() {
        ClassifiedError::timeout(format!("Request timed out: {}", err))
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16(), "")
    } else if err.is_connect() {
        ClassifiedError::unavailable(format!("Connection error: {}", err))
    } else if err.is_redirect() {
        ClassifiedError::unavailable(format!("Too many redirects: {}", err))
    } else if err.is_decode() {
        ClassifiedError::malformed(format!("Response decode error: {}", err), String::new())
    } else if err.is_request() || err.is_body() {
        ClassifiedError::unavailable(format!("Request failed: {}", err))
    } else {
        ClassifiedError::unknown(format!("HTTP client error: {}", err))
    }
}

/// Classify a non-success provider response from its status and body
pub fn classify_status(status: u16, body: &str) -> ClassifiedError {
    let json = serde_json::from_str::<Value>(body).ok();
    let message = json
        .as_ref()
        .and_then(provider_message)
        .map(|m| truncate_string(m, MAX_MESSAGE_LEN))
        .unwrap_or_else(|| status_message(status, body));

    // Provider error codes refine ambiguous statuses (Gemini reports a bad key as 400)
    if let Some(kind) = json.as_ref().and_then(kind_from_provider_code) {
        return ClassifiedError::new(kind, message).with_status(status);
    }

    let kind = match status {
        401 | 403 => ErrorKind::AuthError,
        429 => ErrorKind::RateLimited,
        code => ErrorKind::ProviderHttpError { status_code: code },
    };

    ClassifiedError::new(kind, message).with_status(status)
}

/// Last-resort classification from a human-readable message
pub fn infer_from_message(message: &str) -> ClassifiedError {
    let lowered = message.to_lowercase();
    let message = truncate_string(message, MAX_MESSAGE_LEN);

    let kind = if lowered.contains("quota")
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        ErrorKind::RateLimited
    } else if lowered.contains("api key") || lowered.contains("unauthorized") {
        ErrorKind::AuthError
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        ErrorKind::Timeout
    } else if lowered.contains("connection") || lowered.contains("dns") {
        ErrorKind::ProviderUnavailable
    } else {
        ErrorKind::Unknown
    };

    ClassifiedError::new(kind, message).inferred()
}

/// Map the provider's machine-readable error code, if any
fn kind_from_provider_code(json: &Value) -> Option<ErrorKind> {
    let error = json.get("error")?;

    let has_reason = |wanted: &str| {
        error
            .get("details")
            .and_then(|d| d.as_array())
            .map(|details| {
                details
                    .iter()
                    .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some(wanted))
            })
            .unwrap_or(false)
    };

    if has_reason("API_KEY_INVALID") {
        return Some(ErrorKind::AuthError);
    }

    match error.get("status").and_then(|s| s.as_str()) {
        Some("RESOURCE_EXHAUSTED") => Some(ErrorKind::RateLimited),
        Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED") => Some(ErrorKind::AuthError),
        Some("DEADLINE_EXCEEDED") => Some(ErrorKind::Timeout),
        _ => None,
    }
}

fn provider_message(json: &Value) -> Option<&str> {
    json.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
}

fn status_message(status: u16, body: &str) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status");

    if body.trim().is_empty() {
        format!("{} {}", status, reason)
    } else {
        format!("{} {}: {}", status, reason, truncate_string(body.trim(), 100))
    }
}

/// Parse a `Retry-After` header given in seconds
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: u16) -> &'static str {
    match status {
        400 => "validation",
        401 | 403 => "authentication",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
