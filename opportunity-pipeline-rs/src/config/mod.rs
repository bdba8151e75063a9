//! Configuration management for the pipeline
//!
//! This module provides utilities for loading and validating pipeline
//! configuration, with support for environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Intent;

/// Result type for configuration lookups
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a typed configuration value by parsing from string
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        let value = self.get_string(key)?;
        value.trim().parse::<T>().map_err(|e| ConfigError::invalid(key, e))
    }

    /// Get a typed value, falling back to `default` only when the key is absent.
    /// A present but unparseable value is still an error.
    fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match self.get::<T>(key) {
            Err(ConfigError::Missing(_)) => Ok(default),
            other => other,
        }
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, format!("not a boolean: {}", value))),
        }
    }

    /// Get a boolean configuration value with a default for absent keys
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get_bool(key) {
            Err(ConfigError::Missing(_)) => Ok(default),
            other => other,
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an optional string; absent and blank values are `None`
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_string(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables (e.g., "OPPORTUNITY")
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub(crate) fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        // uppercase, non-alphanumerics become underscores
        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => ConfigError::Missing(env_key.clone()),
            env::VarError::NotUnicode(_) => {
                ConfigError::invalid(env_key.clone(), "environment variable is not valid unicode")
            }
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            match provider.get_string(key) {
                Ok(value) => return Ok(value),
                Err(ConfigError::Missing(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(ConfigError::Missing(key.to_string()))
    }
}

/// Prefix for service-scoped environment overrides, e.g. `OPPORTUNITY_GEMINI_MODEL`
pub const ENV_PREFIX: &str = "OPPORTUNITY";

/// Environment lookup chain: prefixed overrides first, then bare keys
pub fn env_provider_chain(prefix: &str) -> CompositeConfigProvider {
    let mut chain = CompositeConfigProvider::new();
    chain.add_provider(EnvConfigProvider::new().with_prefix(prefix));
    chain.add_provider(EnvConfigProvider::new());
    chain
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<CompositeConfigProvider>> =
    Lazy::new(|| Arc::new(env_provider_chain(ENV_PREFIX)));

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Optional per-opportunity fields requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedFields {
    pub trends: bool,
    pub pros: bool,
    pub cons: bool,
    pub suppliers: bool,
}

impl Default for RequestedFields {
    fn default() -> Self {
        Self {
            trends: true,
            pros: true,
            cons: true,
            suppliers: true,
        }
    }
}

impl RequestedFields {
    /// No optional field requested
    pub fn none() -> Self {
        Self {
            trends: false,
            pros: false,
            cons: false,
            suppliers: false,
        }
    }
}

impl FromStr for RequestedFields {
    type Err = String;

    /// Comma separated list, e.g. `"trends,pros,cons,suppliers"`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut fields = Self::none();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name.to_lowercase().as_str() {
                "trends" => fields.trends = true,
                "pros" => fields.pros = true,
                "cons" => fields.cons = true,
                "suppliers" => fields.suppliers = true,
                other => return Err(format!("unknown optional field '{}'", other)),
            }
        }
        Ok(fields)
    }
}

/// Per-intent deadlines for the provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentTimeouts {
    pub analyze: Duration,
    pub marketing: Duration,
    pub image_prompt: Duration,
}

impl Default for IntentTimeouts {
    fn default() -> Self {
        Self {
            analyze: Duration::from_secs(30),
            marketing: Duration::from_secs(45),
            image_prompt: Duration::from_secs(45),
        }
    }
}

impl IntentTimeouts {
    pub fn for_intent(&self, intent: Intent) -> Duration {
        match intent {
            Intent::Analyze => self.analyze,
            Intent::Marketing => self.marketing,
            Intent::ImagePrompt => self.image_prompt,
        }
    }
}

/// Configuration for the pipeline and its Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Provider API key
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Base URL (can be changed for proxies and tests)
    pub base_url: String,

    pub timeouts: IntentTimeouts,

    /// Opportunities requested per analysis
    pub result_count: usize,


    /// Supplier references requested per opportunity
    pub suppliers_per_opportunity: usize,

    pub requested_fields: RequestedFields,

    /// Attach web search grounding and collect its sources
    pub grounding_enabled: bool,

    /// Hosted image URL template containing `{prompt}`
    pub image_url_template: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: IntentTimeouts::default(),
            result_count: 10,
            suppliers_per_opportunity: 3,
            requested_fields: RequestedFields::default(),
            grounding_enabled: true,
            image_url_template: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let api_key = provider
            .get_optional("gemini_api_key")
            .or_else(|| provider.get_optional("api_key"))
            .ok_or(ConfigError::MissingApiKey)?;

        let timeouts = IntentTimeouts {
            analyze: millis(provider, "analyze_timeout_ms", defaults.timeouts.analyze)?,
            marketing: millis(provider, "marketing_timeout_ms", defaults.timeouts.marketing)?,
            image_prompt: millis(
                provider,
                "image_prompt_timeout_ms",
                defaults.timeouts.image_prompt,
            )?,
        };

        let config = Self {
            api_key,
            model: provider.get_string_or("gemini_model", DEFAULT_MODEL),
            base_url: provider.get_string_or("gemini_base_url", DEFAULT_BASE_URL),
            timeouts,
            result_count: provider.get_or("result_count", defaults.result_count)?,
            suppliers_per_opportunity: provider
                .get_or("suppliers_per_opportunity", defaults.suppliers_per_opportunity)?,
            requested_fields: provider.get_or("requested_fields", defaults.requested_fields)?,
            grounding_enabled: provider
                .get_bool_or("grounding_enabled", defaults.grounding_enabled)?,
            image_url_template: provider.get_optional("image_url_template"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate this configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("gemini_model", "model identifier is required"));
        }

        url::Url::parse(&self.base_url).map_err(|e| ConfigError::invalid("gemini_base_url", e))?;

        if self.result_count == 0 {
            return Err(ConfigError::invalid("result_count", "must be at least 1"));
        }

        for (key, timeout) in [
            ("analyze_timeout_ms", self.timeouts.analyze),
            ("marketing_timeout_ms", self.timeouts.marketing),
            ("image_prompt_timeout_ms", self.timeouts.image_prompt),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }

        if let Some(ref template) = self.image_url_template {
            if !template.contains("{prompt}") {
                return Err(ConfigError::invalid(
                    "image_url_template",
                    "must contain the {prompt} placeholder",
                ));
            }
        }

        Ok(())
    }

    /// Minimum opportunities the validator accepts, the count the prompt requests
    pub fn min_opportunities(&self) -> usize {
        self.result_count
    }
}

fn millis<P: ConfigProvider + ?Sized>(provider: &P, key: &str, default: Duration) -> Result<Duration> {
    let default_ms = default.as_millis() as u64;
    provider.get_or::<u64>(key, default_ms).map(Duration::from_millis)
}
