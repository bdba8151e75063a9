//! Error handling for the opportunity pipeline
//!
//! This module provides the error system that:
//! - Captures low-level provider failures (`ProviderError`)
//! - Classifies them into a closed taxonomy (`ErrorKind`)
//! - Exposes a single boundary type to callers (`ClassifiedError`)
//! - Keeps startup configuration failures separate (`ConfigError`)

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod mapping;
pub use mapping::classify;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// Closed set of failure kinds surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No provider response within the deadline
    Timeout,

    /// Provider quota or rate limit (HTTP 429)
    RateLimited,

    /// Invalid or missing credential (HTTP 401/403)
    AuthError,

    /// Any other non-success provider status
    ProviderHttpError { status_code: u16 },

    /// DNS, connect or TLS failure
    ProviderUnavailable,

    /// Completion text could not be parsed
    MalformedResponse,

    /// Parsed but structurally invalid
    SchemaViolation { field: String },

    /// Caller-supplied parameters fail a precondition
    InvalidRequest,

    /// Nothing better is known
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case code for logs and wire responses
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::ProviderHttpError { .. } => "provider_http_error",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::SchemaViolation { .. } => "schema_violation",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Default retry guidance for this kind
    pub fn is_retriable(&self) -> bool {
        match self {
            ErrorKind::Timeout
            | ErrorKind::RateLimited
            | ErrorKind::ProviderUnavailable
            | ErrorKind::MalformedResponse => true,
            ErrorKind::ProviderHttpError { status_code } => {
                mapping::is_retryable_status(*status_code)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ProviderHttpError { status_code } => {
                write!(f, "provider_http_error({})", status_code)
            }
            ErrorKind::SchemaViolation { field } => write!(f, "schema_violation({})", field),
            other => f.write_str(other.code()),
        }
    }
}

/// How a classification was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Derived from a status code, error type or provider error code
    Structured,

    /// Inferred from human-readable text as a last resort
    Inferred,
}

/// The only error shape that crosses the pipeline boundary
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retriable: bool,
    pub confidence: Confidence,

    /// HTTP status code when the provider answered
    pub status_code: Option<u16>,

    /// Raw candidate text for `MalformedResponse` diagnostics
    pub raw_payload: Option<String>,

    /// Provider-advertised cooldown for `RateLimited`
    pub retry_after: Option<Duration>,

    pub occurred_at: DateTime<Utc>,
}

impl ClassifiedError {
    /// Create a structured classification with the kind's default retry guidance
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retriable = kind.is_retriable();
        Self {
            kind,
            message: message.into(),
            retriable,
            confidence: Confidence::Structured,
            status_code: None,
            raw_payload: None,
            retry_after: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthError, message)
    }

    pub fn provider_http(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderHttpError { status_code }, message).with_status(status_code)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderUnavailable, message)
    }

    /// Unparseable completion; the raw candidate is kept for logging
    pub fn malformed(message: impl Into<String>, raw_payload: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message).with_raw_payload(raw_payload)
    }

    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaViolation { field: field.into() }, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Mark this classification as inferred from message text
    pub fn inferred(mut self) -> Self {
        self.confidence = Confidence::Inferred;
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Attach the model output that caused this error, for diagnostics only
    pub fn with_raw_payload(mut self, raw_payload: impl Into<String>) -> Self {
        self.raw_payload = Some(raw_payload.into());
        self
    }

    /// Check if this classification came from structured signals
    pub fn is_structured(&self) -> bool {
        self.confidence == Confidence::Structured
    }

    /// Field named by a schema violation
    pub fn violated_field(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::SchemaViolation { field } => Some(field),
            _ => None,
        }
    }

    /// Text suitable for end users. Raw model output never appears here.
    pub fn user_message(&self) -> String {
        match &self.kind {
            ErrorKind::InvalidRequest => self.message.clone(),
            ErrorKind::SchemaViolation { field } => format!(
                "La respuesta del modelo no tiene el formato correcto (campo '{}'). Intenta de nuevo.",
                field
            ),
            ErrorKind::RateLimited => match self.retry_after {
                Some(wait) => format!(
                    "Cuota agotada en el proveedor. Intenta de nuevo en {} segundos.",
                    wait.as_secs().max(1)
                ),
                None => "Cuota agotada en el proveedor. Intenta de nuevo en un momento.".to_string(),
            },
            ErrorKind::Timeout => {
                "El análisis tardó demasiado en responder. Intenta de nuevo.".to_string()
            }
            ErrorKind::ProviderUnavailable => {
                "No fue posible contactar al proveedor de IA. Intenta de nuevo.".to_string()
            }
            ErrorKind::AuthError => {
                "El servicio de IA no está configurado correctamente.".to_string()
            }
            ErrorKind::MalformedResponse
            | ErrorKind::ProviderHttpError { .. }
            | ErrorKind::Unknown => "Ocurrió un error inesperado. Intenta de nuevo.".to_string(),
        }
    }
}

/// Low-level failures fed to the classifier
#[derive(Error, Debug)]
pub enum ProviderError {
    /// reqwest transport failure (connect, timeout, body read)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// Provider envelope could not be decoded
    #[error("failed to decode provider response: {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The deadline elapsed before the provider answered
    #[error("deadline of {0:?} elapsed")]
    DeadlineElapsed(Duration),

    /// Error with no structured signal, only a message
    #[error("{0}")]
    Opaque(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode {
            body: String::new(),
            source: err,
        }
    }
}

impl From<ProviderError> for ClassifiedError {
    fn from(err: ProviderError) -> Self {
        classify(err)
    }
}

/// Startup configuration failures, distinct from runtime `AuthError`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    Missing(String),

    #[error("Invalid value for key {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Provider API key is required (set GEMINI_API_KEY or API_KEY)")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
