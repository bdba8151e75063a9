//! # Opportunity Gateway
//!
//! HTTP dispatch surface for the opportunity pipeline. A single JSON endpoint
//! accepts `{"action": ..., ...}` bodies, runs them through the orchestrator
//! and maps classified failures onto HTTP statuses.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue, Request as HttpRequest, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use opportunity_pipeline::config::ConfigProviderExt;
use opportunity_pipeline::{
    retry_classified, ClassifiedError, ConfigError, ConfigProvider, ErrorKind, Orchestrator,
    PipelineOutput, RetryPolicy,
};

pub mod validation;

use validation::{parse_request, payload_limit_config, validate_content_type};

/// Path of the dispatch endpoint
pub const DISPATCH_PATH: &str = "/api/v1/analyze-opportunities";

pub static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Error body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub retriable: bool,
    pub code: u16,
}

/// Body returned for marketing and image-prompt requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse {
    pub content: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: u64,
    pub status: String,
}

/// Gateway settings read alongside the pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub port: u16,
    pub retry_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            retry_attempts: 0,
        }
    }
}

impl GatewayConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: provider.get_or("gateway_port", defaults.port)?,
            retry_attempts: provider.get_or("gateway_retry_attempts", defaults.retry_attempts)?,
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    retry: RetryPolicy,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            retry: RetryPolicy::none(),
        }
    }

    /// Retry retriable failures up to `attempts` extra times per request
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry = RetryPolicy::default().with_max_retries(attempts);
        self
    }
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route(DISPATCH_PATH, post(dispatch_handler))
        .layer(middleware::from_fn(validate_content_type_middleware))
        .layer(payload_limit_config())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Opportunity Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            format!("POST {}", DISPATCH_PATH)
        ]
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        service_name: "opportunity-gateway".to_string(),
        uptime_seconds: START_TIME.elapsed().as_secs(),
        status: "SERVING".to_string(),
    })
}

async fn dispatch_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!("Rejected dispatch body: {}", err);
            return err.to_response().into_response();
        }
    };

    let intent = request.intent();
    let orchestrator = state.orchestrator.as_ref();
    let request = &request;

    let outcome = if state.retry.max_retries > 0 {
        retry_classified(&state.retry, move || orchestrator.run(request)).await
    } else {
        orchestrator.run(request).await
    };

    match outcome {
        Ok(output) => output_response(output),
        Err(err) => {
            tracing::warn!(%intent, kind = err.kind.code(), "Dispatch failed: {}", err.message);
            error_response(&err)
        }
    }
}

fn output_response(output: PipelineOutput) -> Response {
    match output {
        PipelineOutput::Analysis(result) => (StatusCode::OK, Json(result)).into_response(),
        PipelineOutput::MarketingCopy(content) => (
            StatusCode::OK,
            Json(ContentResponse {
                content,
                image_url: None,
            }),
        )
            .into_response(),
        PipelineOutput::ImagePrompt { prompt, image_url } => (
            StatusCode::OK,
            Json(ContentResponse {
                content: prompt,
                image_url,
            }),
        )
            .into_response(),
    }
}

/// HTTP status for a classified failure
pub fn status_for(kind: &ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::AuthError
        | ErrorKind::ProviderHttpError { .. }
        | ErrorKind::MalformedResponse
        | ErrorKind::SchemaViolation { .. } => StatusCode::BAD_GATEWAY,
        ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a classified failure; raw model output is never included
pub fn error_response(err: &ClassifiedError) -> Response {
    let status = status_for(&err.kind);
    let body = ErrorResponse {
        error: err.user_message(),
        kind: err.kind.code().to_string(),
        retriable: err.retriable,
        code: status.as_u16(),
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(wait) = err.retry_after {
        if let Ok(value) = HeaderValue::from_str(&wait.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

async fn validate_content_type_middleware(req: HttpRequest<Body>, next: Next) -> Response {
    if req.uri().path() == DISPATCH_PATH && req.method() == axum::http::Method::POST {
        if let Err(err) = validate_content_type(req.headers(), "application/json") {
            return err.to_response().into_response();
        }
    }

    next.run(req).await
}
