//! Test fixtures: a garment category schema and canned model answers

#![allow(dead_code)]

use attribute_extractor::models::schema::{AttributeFieldSpec, FieldOption};

pub const GARMENT_CATEGORY: &str = "tops";

/// Garment schema: two controlled vocabularies and one free-text field.
pub fn garment_fields() -> Vec<AttributeFieldSpec> {
    vec![
        AttributeFieldSpec::select(
            "neckline",
            "Neckline",
            vec![
                FieldOption::new("crew", "Crew Neck"),
                FieldOption::new("v_neck", "V Neck"),
                FieldOption::new("boat", "Boat Neck"),
            ],
        ),
        AttributeFieldSpec::select(
            "color",
            "Color",
            vec![
                FieldOption::new("navy", "Navy Blue"),
                FieldOption::new("red", "Red"),
                FieldOption::new("olive", "Olive Green"),
            ],
        ),
        AttributeFieldSpec::text("care_label", "Care Label"),
    ]
}

/// Exact hit on neckline, near-miss on color, care label not visible.
///
/// "Navy Blu" normalizes to "navyblu", which is contained in "navyblue":
/// similarity 0.8, accepted above the 0.7 threshold at 0.8 * 0.8 = 0.64.
pub const GARMENT_RESPONSE: &str = r#"```json
{
  "neckline": {"value": "Crew Neck", "reasoning": "Rounded collar hugging the neck"},
  "color": "Navy Blu",
  "care_label": "not_visible"
}
```"#;

pub const NECKLINE_CONFIDENCE: f64 = 0.95;
pub const COLOR_CONFIDENCE: f64 = 0.64;
pub const CARE_LABEL_CONFIDENCE: f64 = 0.6;

/// Answer carrying two out-of-schema attributes and one schema collision.
pub const DISCOVERY_RESPONSE: &str = r#"{
  "neckline": "crew",
  "color": "red",
  "care_label": "Machine wash cold",
  "discoveries": [
    {"key": "Sleeve Length", "value": "Long", "confidence": 0.9, "suggestedType": "select"},
    {"key": "pattern", "label": "Pattern", "value": " Striped ", "confidence": 85, "reasoning": "Horizontal stripes"},
    {"key": "color", "value": "maroon", "confidence": 99}
  ]
}"#;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
