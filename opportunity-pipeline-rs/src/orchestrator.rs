//! Per-request pipeline orchestration
//!
//! The orchestrator checks preconditions, builds the prompt, performs one
//! provider call under the intent's deadline, then sanitizes and validates
//! the completion. Every exit yields an output or exactly one
//! `ClassifiedError`. It holds no mutable state, so one instance can serve
//! concurrent requests.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{IntentTimeouts, PipelineConfig};
use crate::error::{ClassifiedError, ConfigError, ErrorKind, Result};
use crate::invoker::{GeminiInvoker, InvokeOptions, ModelInvoker};
use crate::models::{AnalyzeRequest, Intent, OpportunityResult, PipelineOutput, Request};
use crate::prompt::PromptBuilder;
use crate::sanitize::sanitize;
use crate::util::{generate_request_id, sanitize_for_logging, truncate_string};
use crate::validate::SchemaValidator;

/// Longest raw payload excerpt written to logs
const LOG_PAYLOAD_LEN: usize = 500;

/// Composes the pipeline stages for one request at a time
#[derive(Clone)]
pub struct Orchestrator {
    invoker: Arc<dyn ModelInvoker>,
    prompts: PromptBuilder,
    validator: SchemaValidator,
    timeouts: IntentTimeouts,
    grounding_enabled: bool,
    image_url_template: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator around any invoker
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: &PipelineConfig) -> Self {
        Self {
            invoker,
            prompts: PromptBuilder::from_config(config),
            validator: SchemaValidator::from_config(config),
            timeouts: config.timeouts,
            grounding_enabled: config.grounding_enabled,
            image_url_template: config.image_url_template.clone(),
        }
    }

    /// Create an orchestrator backed by the Gemini invoker
    pub fn from_config(config: PipelineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let invoker = GeminiInvoker::new(&config)?;
        Ok(Self::new(Arc::new(invoker), &config))
    }

    /// Replace the prompt builder (fixed reference date, custom counts)
    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Run one request to completion
    pub async fn run(&self, request: &Request) -> Result<PipelineOutput> {
        let intent = request.intent();
        let request_id = generate_request_id();
        let span = tracing::info_span!("pipeline_run", %intent, request_id = %request_id);

        async {
            let result = self.execute(request).await;
            match &result {
                Ok(_) => info!("Request {} ({}) completed", request_id, intent),
                Err(err) => warn!(
                    "Request {} ({}) failed: {} (retriable: {})",
                    request_id,
                    intent,
                    err.kind.code(),
                    err.retriable
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run a request that the caller may cancel.
    ///
    /// Returns `None` when the token is cancelled before the run finishes;
    /// the in-flight provider call is dropped. A result that completes after
    /// cancellation is also discarded.
    pub async fn run_cancellable(
        &self,
        request: &Request,
        token: &CancellationToken,
    ) -> Option<Result<PipelineOutput>> {
        if token.is_cancelled() {
            return None;
        }

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("{} request cancelled by caller", request.intent());
                return None;
            }
            outcome = self.run(request) => outcome,
        };

        if token.is_cancelled() {
            None
        } else {
            Some(outcome)
        }
    }

    /// Convenience wrapper for the analyze intent
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<OpportunityResult> {
        let output = self.run(&Request::Analyze(request)).await?;
        output
            .into_analysis()
            .ok_or_else(|| ClassifiedError::unknown("analyze request produced a non-analysis output"))
    }

    async fn execute(&self, request: &Request) -> Result<PipelineOutput> {
        check_preconditions(request)?;

        let intent = request.intent();
        let prompt = self.prompts.build(request);
        let options = InvokeOptions::new(self.timeouts.for_intent(intent))
            .with_grounding(self.grounding_enabled && intent == Intent::Analyze);

        debug!(
            "Invoking {} for {} ({} prompt chars)",
            self.invoker.name(),
            intent,
            prompt.chars().count()
        );

        // the invoker future is dropped on expiry, cancelling its request
        let completion =
            match tokio::time::timeout(options.timeout, self.invoker.invoke(&prompt, options)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ClassifiedError::timeout(format!(
                        "No response from provider within {} ms",
                        options.timeout.as_millis()
                    )));
                }
            };

        match request {
            Request::Analyze(_) => {
                let candidate = sanitize(&completion.text);
                let mut result = self
                    .validator
                    .validate_analysis(&candidate)
                    .map_err(log_rejected_payload)?;
                result.sources = completion.sources;
                Ok(PipelineOutput::Analysis(result))
            }
            Request::Marketing(_) => {
                let text = self
                    .validator
                    .validate_text(&completion.text)
                    .map_err(log_rejected_payload)?;
                Ok(PipelineOutput::MarketingCopy(text))
            }
            Request::ImagePrompt(_) => {
                let prompt = self
                    .validator
                    .validate_text(&completion.text)
                    .map_err(log_rejected_payload)?;
                let image_url = self.image_url(&prompt);
                Ok(PipelineOutput::ImagePrompt { prompt, image_url })
            }
        }
    }

    /// Hosted image URL for a generated prompt, when a template is configured
    pub fn image_url(&self, prompt: &str) -> Option<String> {
        self.image_url_template.as_ref().map(|template| {
            // form encoding writes spaces as '+' and escapes literal '+'
            let encoded: String = url::form_urlencoded::byte_serialize(prompt.as_bytes())
                .collect::<String>()
                .replace('+', "%20");
            template.replace("{prompt}", &encoded)
        })
    }
}

/// Reject requests that can never succeed before any network call
fn check_preconditions(request: &Request) -> Result<()> {
    match request {
        Request::Analyze(analyze) => {
            if !analyze.investment_amount.is_finite() || analyze.investment_amount <= 0.0 {
                return Err(ClassifiedError::invalid_request(
                    "El monto de inversión debe ser un número mayor a cero.",
                ));
            }
            if analyze.location.trim().is_empty() {
                return Err(ClassifiedError::invalid_request("Debes indicar una ubicación."));
            }
        }
        Request::Marketing(marketing) => {
            if marketing.title.trim().is_empty() {
                return Err(ClassifiedError::invalid_request(
                    "Debes indicar el título de la oportunidad.",
                ));
            }
        }
        Request::ImagePrompt(image) => {
            if image.source_text.trim().is_empty() {
                return Err(ClassifiedError::invalid_request(
                    "Debes indicar el guion de ventas para generar la imagen.",
                ));
            }
        }
    }
    Ok(())
}

fn log_rejected_payload(err: ClassifiedError) -> ClassifiedError {
    match (&err.kind, &err.raw_payload) {
        (ErrorKind::MalformedResponse, Some(raw)) => warn!(
            "Rejected model payload: {}",
            truncate_string(&sanitize_for_logging(raw), LOG_PAYLOAD_LEN)
        ),
        (ErrorKind::SchemaViolation { field }, raw) => warn!(
            "Model payload violates schema at {}: {} (payload: {})",
            field,
            err.message,
            raw.as_deref()
                .map(|raw| truncate_string(&sanitize_for_logging(raw), LOG_PAYLOAD_LEN))
                .unwrap_or_default()
        ),
        _ => {}
    }
    err
}
