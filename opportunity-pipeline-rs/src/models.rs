//! Pipeline data models
//!
//! This module contains the request shapes accepted by the orchestrator and
//! the canonical result types handed to the rendering layer. Wire names are
//! camelCase to match the dispatch contract used by the web client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Business category used to frame an analysis
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Services, subscriptions, franchises, startups
    #[default]
    General,
    /// Product sales: e-commerce, dropshipping, direct sales
    Products,
}

/// Investment analysis request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Budget in the local currency of `location`
    #[serde(alias = "investment")]
    pub investment_amount: f64,

    /// Country or city, embedded verbatim in the prompt
    pub location: String,

    /// Analysis framing
    #[serde(default, alias = "type")]
    pub category: Category,
}

/// Marketing copy request for a single opportunity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strategy: String,
}

/// Image prompt request derived from a sales script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePromptRequest {
    #[serde(alias = "script")]
    pub source_text: String,
}

/// A pipeline request, tagged by `action` on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Request {
    /// `"analyze"`
    Analyze(AnalyzeRequest),
    /// `"marketing"`
    Marketing(MarketingRequest),
    /// `"image-prompt"`
    ImagePrompt(ImagePromptRequest),
}

impl Request {
    /// The intent this request dispatches to
    pub fn intent(&self) -> Intent {
        match self {
            Request::Analyze(_) => Intent::Analyze,
            Request::Marketing(_) => Intent::Marketing,
            Request::ImagePrompt(_) => Intent::ImagePrompt,
        }
    }
}

impl From<AnalyzeRequest> for Request {
    fn from(request: AnalyzeRequest) -> Self {
        Request::Analyze(request)
    }
}

impl From<MarketingRequest> for Request {
    fn from(request: MarketingRequest) -> Self {
        Request::Marketing(request)
    }
}

impl From<ImagePromptRequest> for Request {
    fn from(request: ImagePromptRequest) -> Self {
        Request::ImagePrompt(request)
    }
}

/// Kind of generative request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Analyze,
    Marketing,
    ImagePrompt,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyze => write!(f, "analyze"),
            Self::Marketing => write!(f, "marketing"),
            Self::ImagePrompt => write!(f, "image-prompt"),
        }
    }
}

/// Estimated difficulty of running an opportunity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Baja,
    Media,
    Alta,
}

impl Difficulty {
    /// Parse one of the three literals, ignoring case and surrounding whitespace
    pub fn from_literal(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "baja" => Some(Self::Baja),
            "media" => Some(Self::Media),
            "alta" => Some(Self::Alta),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baja => write!(f, "Baja"),
            Self::Media => write!(f, "Media"),
            Self::Alta => write!(f, "Alta"),
        }
    }
}

/// Wholesale supplier reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    pub url: String,
    pub shipping_days: String,
}

/// A single business opportunity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Unique within one result, not globally
    pub id: String,
    pub title: String,
    pub description: String,
    pub initial_investment: f64,
    /// Free text such as "20% anual"
    #[serde(rename = "expectedROI")]
    pub expected_roi: String,
    pub difficulty: Difficulty,
    pub trends: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub marketing_strategy: String,
    pub reference_url: String,
    pub suppliers: Vec<Supplier>,
}

/// Web citation attached by provider grounding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Canonical result of the analyze intent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityResult {
    pub market_overview: String,
    pub currency_symbol: String,
    pub currency_code: String,
    /// Model output order, never empty
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

/// Final output of one orchestrator run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Analysis(OpportunityResult),
    MarketingCopy(String),
    ImagePrompt {
        prompt: String,
        /// Hosted image URL when an image provider template is configured
        image_url: Option<String>,
    },
}

impl PipelineOutput {
    pub fn intent(&self) -> Intent {
        match self {
            PipelineOutput::Analysis(_) => Intent::Analyze,
            PipelineOutput::MarketingCopy(_) => Intent::Marketing,
            PipelineOutput::ImagePrompt { .. } => Intent::ImagePrompt,
        }
    }

    pub fn into_analysis(self) -> Option<OpportunityResult> {
        match self {
            PipelineOutput::Analysis(result) => Some(result),
            _ => None,
        }
    }
}
