//! Model invocation
//!
//! This module defines the seam between the pipeline and a generative
//! provider. An invoker performs exactly one provider call per `invoke` and
//! never retries.

mod gemini;
pub mod models;

pub use gemini::{GeminiInvoker, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::GroundingSource;

/// Per-call invocation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Upper bound for the whole provider exchange
    pub timeout: Duration,

    /// Attach the provider's web search tool
    pub grounding: bool,
}

impl InvokeOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            grounding: false,
        }
    }

    pub fn with_grounding(mut self, grounding: bool) -> Self {
        self.grounding = grounding;
        self
    }
}

/// Raw completion text plus out-of-band grounding citations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Candidate text exactly as received
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<GroundingSource>) -> Self {
        self.sources = sources;
        self
    }
}

/// A generative model provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Perform one provider call. Failures are already classified.
    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<Completion>;
}
