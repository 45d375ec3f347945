use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::discovery::DiscoveryObservation;

/// Validated value of one schema field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDetail {
    pub value: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    pub is_valid: bool,
}

impl AttributeDetail {
    /// Detail for a field the response could not provide (parse failure or rejected value).
    pub fn rejected(reasoning: impl Into<String>) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
            is_valid: false,
        }
    }
}

/// Token counts reported by the model provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.total_tokens.unwrap_or_else(|| {
            self.input_tokens
                .unwrap_or(0)
                .saturating_add(self.output_tokens.unwrap_or(0))
        })
    }
}

/// Payload of a successfully executed extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    pub attributes: BTreeMap<String, AttributeDetail>,
    pub overall_confidence: f64,
    pub tokens_used: u32,
    /// Wall-clock milliseconds spent on model call and validation.
    pub processing_time: u64,
    /// Estimated cost in USD.
    pub cost: f64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discoveries: Vec<DiscoveryObservation>,
}

/// Terminal outcome of an extraction, tagged by job status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Completed(ExtractionOutput),
    Failed { error: String },
}

impl ExtractionResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExtractionResult::Completed(_))
    }
}
