//! Schema validation and normalization
//!
//! The candidate is parsed into an untyped `serde_json::Value` first and
//! checked field by field; only a fully checked value becomes an
//! `OpportunityResult`. Optional arrays normalize to empty, everything else
//! that is missing or mistyped fails with `SchemaViolation` naming the field.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::error::{ClassifiedError, Result};
use crate::models::{Difficulty, Opportunity, OpportunityResult, Supplier};
use crate::sanitize;

/// Validates sanitized candidates into canonical results
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    min_opportunities: usize,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SchemaValidator {
    pub fn new(min_opportunities: usize) -> Self {
        Self {
            min_opportunities: min_opportunities.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_opportunities())
    }

    /// Parse and validate an analyze candidate
    pub fn validate_analysis(&self, candidate: &str) -> Result<OpportunityResult> {
        if !candidate.contains('{') {
            return Err(ClassifiedError::malformed(
                "No JSON object found in model response",
                candidate,
            ));
        }

        let value: Value = serde_json::from_str(candidate).map_err(|e| {
            ClassifiedError::malformed(format!("Model response is not valid JSON: {}", e), candidate)
        })?;

        self.normalize(&value)
            .map_err(|err| err.with_raw_payload(candidate))
    }

    /// Validate an already-parsed value
    pub fn normalize(&self, value: &Value) -> Result<OpportunityResult> {
        let root = value
            .as_object()
            .ok_or_else(|| ClassifiedError::schema("$", "expected a JSON object"))?;

        let market_overview = required_string(root, "marketOverview", "marketOverview")?;
        let currency_symbol = required_string(root, "currencySymbol", "currencySymbol")?;
        let currency_code = required_string(root, "currencyCode", "currencyCode")?;

        let items = match root.get("opportunities") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ClassifiedError::schema("opportunities", "expected an array"));
            }
            None => {
                return Err(ClassifiedError::schema("opportunities", "missing required field"));
            }
        };

        if items.len() < self.min_opportunities {
            return Err(ClassifiedError::schema(
                "opportunities",
                format!(
                    "expected at least {} opportunities, got {}",
                    self.min_opportunities,
                    items.len()
                ),
            ));
        }

        let mut seen_ids = HashSet::new();
        let mut opportunities = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let opportunity = normalize_opportunity(item, index)?;
            if !seen_ids.insert(opportunity.id.clone()) {
                return Err(ClassifiedError::schema(
                    format!("opportunities[{}].id", index),
                    format!("duplicate id '{}'", opportunity.id),
                ));
            }
            opportunities.push(opportunity);
        }

        Ok(OpportunityResult {
            market_overview,
            currency_symbol,
            currency_code,
            opportunities,
            sources: Vec::new(),
        })
    }

    /// Validate a free-text completion (marketing copy, image prompt)
    pub fn validate_text(&self, raw: &str) -> Result<String> {
        let text = sanitize::clean_text(raw);
        if text.is_empty() {
            return Err(ClassifiedError::malformed("Model returned an empty response", raw));
        }
        Ok(text)
    }
}

fn normalize_opportunity(item: &Value, index: usize) -> Result<Opportunity> {
    let path = |field: &str| format!("opportunities[{}].{}", index, field);

    let obj = item.as_object().ok_or_else(|| {
        ClassifiedError::schema(format!("opportunities[{}]", index), "expected an object")
    })?;

    let difficulty_raw = required_string(obj, "difficulty", &path("difficulty"))?;
    let difficulty = Difficulty::from_literal(&difficulty_raw).ok_or_else(|| {
        ClassifiedError::schema(
            path("difficulty"),
            format!("expected Baja, Media or Alta, got '{}'", difficulty_raw),
        )
    })?;

    Ok(Opportunity {
        id: required_string(obj, "id", &path("id"))?,
        title: required_string(obj, "title", &path("title"))?,
        description: required_string(obj, "description", &path("description"))?,
        initial_investment: investment(obj.get("initialInvestment"), &path("initialInvestment"))?,
        expected_roi: required_string(obj, "expectedROI", &path("expectedROI"))?,
        difficulty,
        trends: string_array(obj, "trends", &path("trends"))?,
        pros: string_array(obj, "pros", &path("pros"))?,
        cons: string_array(obj, "cons", &path("cons"))?,
        marketing_strategy: required_string(obj, "marketingStrategy", &path("marketingStrategy"))?,
        reference_url: required_string(obj, "referenceUrl", &path("referenceUrl"))?,
        suppliers: suppliers(obj, &path("suppliers"))?,
    })
}

fn required_string(obj: &Map<String, Value>, key: &str, field: &str) -> Result<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(ClassifiedError::schema(field, "missing required field")),
        Some(_) => Err(ClassifiedError::schema(field, "expected a string")),
    }
}

fn investment(value: Option<&Value>, field: &str) -> Result<f64> {
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => {
            return Err(ClassifiedError::schema(field, "missing required field"));
        }
        Some(_) => None,
    };

    match amount {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(ClassifiedError::schema(field, "expected a non-negative number")),
    }
}

/// Missing or null arrays normalize to empty
fn string_array(obj: &Map<String, Value>, key: &str, field: &str) -> Result<Vec<String>> {
    match obj.get(key) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ClassifiedError::schema(
                    format!("{}[{}]", field, i),
                    "expected a string",
                )),
            })
            .collect(),
        Some(_) => Err(ClassifiedError::schema(field, "expected an array")),
    }
}

fn suppliers(obj: &Map<String, Value>, field: &str) -> Result<Vec<Supplier>> {
    let items = match obj.get("suppliers") {
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ClassifiedError::schema(field, "expected an array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("{}[{}]", field, i);
            let supplier = item
                .as_object()
                .ok_or_else(|| ClassifiedError::schema(path.clone(), "expected an object"))?;

            // models answer shipping time as "7-10 días" or as a bare integer
            let shipping_days = match supplier.get("shippingDays") {
                Some(Value::Number(n)) if n.is_u64() || n.is_i64() => n.to_string(),
                _ => required_string(supplier, "shippingDays", &format!("{}.shippingDays", path))?,
            };

            Ok(Supplier {
                name: required_string(supplier, "name", &format!("{}.name", path))?,
                url: required_string(supplier, "url", &format!("{}.url", path))?,
                shipping_days,
            })
        })
        .collect()
}
