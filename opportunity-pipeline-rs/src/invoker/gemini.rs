//! Gemini `generateContent` invoker

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client};

use super::models::{GenerateContentRequest, GenerateContentResponse};
use super::{Completion, InvokeOptions, ModelInvoker};
use crate::config::PipelineConfig;
use crate::error::mapping::{classify_http_error, retry_after_from_headers};
use crate::error::{classify, ClassifiedError, ConfigError, ProviderError, Result};
use crate::models::GroundingSource;
use crate::util::{sanitize_for_logging, truncate_string};

/// User agent sent to the provider
pub const USER_AGENT: &str = concat!("opportunity-pipeline/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_SOURCE_TITLE: &str = "Fuente de mercado";
const DEFAULT_SOURCE_URI: &str = "#";

/// Gemini API invoker
#[derive(Clone)]
pub struct GeminiInvoker {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiInvoker {
    /// Create an invoker from pipeline configuration
    pub fn new(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

        // deadlines are set per request from `InvokeOptions`
        let http_client = Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// One HTTP exchange; returns the success body
    async fn send(&self, prompt: &str, options: InvokeOptions) -> std::result::Result<String, ProviderError> {
        let url = self.endpoint();
        let request = GenerateContentRequest::from_prompt(prompt, options.grounding);

        debug!(
            "Sending request to Gemini: POST {} (grounding: {}, timeout: {:?})",
            sanitize_for_logging(&url),
            options.grounding,
            options.timeout
        );

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .timeout(options.timeout)
            .send()
            .await?;

        let status = response.status();
        let retry_after = retry_after_from_headers(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                "Gemini returned {} ({}): {}",
                status.as_u16(),
                classify_http_error(status.as_u16()),
                truncate_string(&sanitize_for_logging(&body), 200)
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        Ok(body)
    }
}

impl fmt::Debug for GeminiInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiInvoker")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ModelInvoker for GeminiInvoker {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<Completion> {
        let start = Instant::now();

        let body = match tokio::time::timeout(options.timeout, self.send(prompt, options)).await {
            Ok(result) => result.map_err(classify)?,
            Err(_) => return Err(classify(ProviderError::DeadlineElapsed(options.timeout))),
        };

        let envelope: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|source| {
                classify(ProviderError::Decode {
                    body: body.clone(),
                    source,
                })
            })?;

        let completion = completion_from_envelope(envelope)
            .ok_or_else(|| ClassifiedError::malformed("Provider returned no candidates", body.as_str()))?;

        debug!(
            "Gemini completion received in {:?}: {} chars, {} sources",
            start.elapsed(),
            completion.text.chars().count(),
            completion.sources.len()
        );

        Ok(completion)
    }
}

/// Concatenate the first candidate's text parts and collect grounding sources
fn completion_from_envelope(envelope: GenerateContentResponse) -> Option<Completion> {
    let candidate = envelope.candidates.into_iter().next()?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let sources = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .map(|chunk| {
                    let web = chunk.web.unwrap_or_default();
                    GroundingSource {
                        title: web
                            .title
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
                        uri: web
                            .uri
                            .filter(|u| !u.is_empty())
                            .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Completion { text, sources })
}
