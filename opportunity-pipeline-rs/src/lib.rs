//! # Opportunity Pipeline
//!
//! LLM orchestration and response normalization for the business-opportunity
//! recommender.
//!
//! This crate provides:
//!
//! - Prompt construction per request intent (analyze, marketing copy, image prompt)
//! - A provider invoker for the Gemini `generateContent` API
//! - Sanitization of raw completions into candidate JSON
//! - Schema validation and normalization into canonical result types
//! - A closed error taxonomy with structured classification
//! - Configuration management utilities
//!
//! ## Architecture
//!
//! A request flows through the following stages:
//!
//! - `PromptBuilder`: turns a `Request` into prompt text
//! - `ModelInvoker`: performs exactly one provider call under a deadline
//! - `sanitize`: isolates the candidate JSON object in a raw completion
//! - `SchemaValidator`: parses, validates and normalizes the candidate
//! - `Orchestrator`: composes the stages and returns a `PipelineOutput`
//!   or exactly one `ClassifiedError`

// Re-export data model
pub mod models;
pub use models::{
    AnalyzeRequest, Category, Difficulty, GroundingSource, ImagePromptRequest, Intent,
    MarketingRequest, Opportunity, OpportunityResult, PipelineOutput, Request, Supplier,
};

// Re-export error handling
pub mod error;
pub use error::{ClassifiedError, ConfigError, Confidence, ErrorKind, ProviderError};

// Re-export configuration management
pub mod config;
pub use config::{ConfigProvider, PipelineConfig};

// Pipeline stages
pub mod prompt;
pub use prompt::PromptBuilder;

pub mod invoker;
pub use invoker::{Completion, GeminiInvoker, InvokeOptions, ModelInvoker};

pub mod sanitize;
pub use sanitize::sanitize;

pub mod validate;
pub use validate::SchemaValidator;

pub mod orchestrator;
pub use orchestrator::Orchestrator;

// Caller-side helpers
pub mod gate;
pub use gate::{RequestGate, RequestTicket};

pub mod resilience;
pub use resilience::{retry_classified, RetryPolicy};

// Utility module for common functionality
pub mod util;

#[cfg(test)]
mod tests;

/// Create an orchestrator backed by the Gemini invoker, configured from the
/// process environment.
pub fn orchestrator_from_env() -> Result<Orchestrator, ConfigError> {
    let config = PipelineConfig::from_provider(&**config::DEFAULT_PROVIDER)?;
    Orchestrator::from_config(config)
}
