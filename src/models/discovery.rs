use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::schema::FieldType;

/// A single out-of-schema attribute reported by the model for one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryObservation {
    /// snake_case attribute key.
    pub key: String,
    pub label: String,
    pub raw_value: String,
    pub normalized_value: String,
    /// 0-100.
    pub confidence: u8,
    pub reasoning: String,
    pub suggested_type: FieldType,
}

/// Aggregated statistics for one discovered attribute key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAttribute {
    pub key: String,
    pub label: String,
    pub raw_value: String,
    pub normalized_value: String,
    /// Running average of observed confidences, 0-100.
    pub confidence: u8,
    pub reasoning: String,
    pub frequency: u32,
    pub suggested_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    pub is_promotable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counters over a set of discoveries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStats {
    /// Total observations (sum of frequencies).
    pub total_found: u32,
    /// Entries with confidence >= 80.
    pub high_confidence: u32,
    pub schema_promotable: u32,
    pub unique_keys: u32,
}

/// Field definition proposed from a promotable discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFieldDraft {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub description: String,
}
