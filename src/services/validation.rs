use std::collections::{BTreeMap, BTreeSet};

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

use crate::models::discovery::DiscoveryObservation;
use crate::models::extraction::AttributeDetail;
use crate::models::schema::{AttributeFieldSpec, FieldOption, FieldType};

/// Value the model is told to return when an attribute cannot be seen.
pub const NOT_VISIBLE: &str = "not_visible";

/// Confidence when the model declines to answer (absent or not visible).
pub const DECLINED_CONFIDENCE: f64 = 0.6;

/// Confidence for free-text fields (no controlled vocabulary).
pub const FREE_TEXT_CONFIDENCE: f64 = 0.85;

/// Confidence for a case-insensitive shortForm/fullForm hit.
pub const EXACT_MATCH_CONFIDENCE: f64 = 0.95;

/// Fuzzy scores must be strictly above this to be accepted.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.7;

/// Accepted fuzzy scores are scaled by this factor.
pub const FUZZY_CONFIDENCE_FACTOR: f64 = 0.8;

/// Free-text values are truncated to this many characters.
pub const MAX_TEXT_CHARS: usize = 100;

/// Confidence assumed for discoveries that do not report one (0-100).
const DEFAULT_DISCOVERY_CONFIDENCE: f64 = 50.0;

/// Result of validating one raw model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub attributes: BTreeMap<String, AttributeDetail>,
    pub overall_confidence: f64,
    pub errors: Vec<String>,
    pub discoveries: Vec<DiscoveryObservation>,
}

// ── Typed model payload ──────────────────────────────────────────────

/// Scalar answer for a field. Lists are rendered comma separated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    List(Vec<Scalar>),
}

impl Scalar {
    fn render(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
            Scalar::List(items) => items
                .iter()
                .map(Scalar::render)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Plain(Scalar),
    Detailed {
        #[serde(default)]
        value: Option<Scalar>,
        #[serde(default)]
        reasoning: Option<String>,
    },
    Unrecognized(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiscovery {
    key: String,
    #[serde(default)]
    label: Option<String>,
    value: Scalar,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default, alias = "suggested_type")]
    suggested_type: Option<FieldType>,
}

#[derive(Debug, Deserialize)]
struct ModelPayload {
    #[serde(default, deserialize_with = "lenient_discoveries")]
    discoveries: Vec<RawDiscovery>,
    #[serde(flatten)]
    fields: BTreeMap<String, Option<RawField>>,
}

/// Drop malformed discovery entries instead of failing the whole payload.
/// Anything other than an array is ignored.
fn lenient_discoveries<'de, D>(deserializer: D) -> Result<Vec<RawDiscovery>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Array(entries)) => entries,
        _ => return Ok(Vec::new()),
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

// ── Public API ───────────────────────────────────────────────────────

/// Validate a raw model response against the category's field specs.
///
/// A response that is not a JSON object (after fence stripping) fails the
/// whole extraction: every field is null with confidence 0 and a single
/// parse error is reported. Everything else is recovered per field.
pub fn validate_response(raw: &str, fields: &[AttributeFieldSpec]) -> ValidationOutcome {
    let payload: ModelPayload = match serde_json::from_str(strip_code_fences(raw)) {
        Ok(payload) => payload,
        Err(e) => return parse_failure(fields, &e),
    };

    let mut attributes = BTreeMap::new();
    let mut errors = Vec::new();

    for field in fields {
        let raw_field = payload.fields.get(&field.key).and_then(Option::as_ref);
        let detail = validate_field(field, raw_field, &mut errors);
        attributes.insert(field.key.clone(), detail);
    }

    let overall_confidence = mean_confidence(&attributes);
    let discoveries = collect_discoveries(payload.discoveries, fields);

    ValidationOutcome {
        attributes,
        overall_confidence,
        errors,
        discoveries,
    }
}

/// Remove Markdown code fences (```json ... ```) around a payload.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Optional language tag such as `json`, then whitespace.
    let tag_len = after
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .count();
    let body = after[tag_len..].trim_start();
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Character-bag similarity in [0, 1].
///
/// Both strings are lowercased and stripped of non-alphanumerics. Equal
/// strings score 1.0, containment scores 0.8, anything else is the Jaccard
/// index of the two character sets. Empty inputs score 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_for_match(a);
    let b = normalize_for_match(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }

    let set_a: BTreeSet<char> = a.chars().collect();
    let set_b: BTreeSet<char> = b.chars().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f64 / union as f64
}

/// Title-cased label derived from a snake_case key.
pub fn label_from_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Internals ────────────────────────────────────────────────────────

fn normalize_for_match(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn is_not_visible(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case(NOT_VISIBLE) || v.eq_ignore_ascii_case("not visible")
}

fn parse_failure(fields: &[AttributeFieldSpec], err: &serde_json::Error) -> ValidationOutcome {
    let attributes = fields
        .iter()
        .map(|f| (f.key.clone(), AttributeDetail::rejected("Model response could not be parsed")))
        .collect();

    ValidationOutcome {
        attributes,
        overall_confidence: 0.0,
        errors: vec![format!("Failed to parse model response as JSON: {}", err)],
        discoveries: Vec::new(),
    }
}

fn validate_field(
    field: &AttributeFieldSpec,
    raw: Option<&RawField>,
    errors: &mut Vec<String>,
) -> AttributeDetail {
    let (value, reasoning) = match raw {
        None => (None, None),
        Some(RawField::Plain(scalar)) => (Some(scalar.render()), None),
        Some(RawField::Detailed { value, reasoning }) => {
            (value.as_ref().map(Scalar::render), reasoning.clone())
        }
        Some(RawField::Unrecognized(_)) => {
            errors.push(format!("Invalid '{}': unsupported value shape", field.label));
            return AttributeDetail::rejected("Unsupported value shape");
        }
    };

    let value = match value {
        Some(v) if !v.trim().is_empty() && !is_not_visible(&v) => v,
        _ => {
            return AttributeDetail {
                value: None,
                confidence: DECLINED_CONFIDENCE,
                reasoning: reasoning.unwrap_or_else(|| "Not visible in image".to_string()),
                is_valid: true,
            };
        }
    };

    if !field.has_options() {
        return AttributeDetail {
            value: Some(value.trim().chars().take(MAX_TEXT_CHARS).collect()),
            confidence: FREE_TEXT_CONFIDENCE,
            reasoning: reasoning.unwrap_or_else(|| "Free text value".to_string()),
            is_valid: true,
        };
    }

    if let Some(option) = exact_option(&field.options, &value) {
        return AttributeDetail {
            value: Some(option.short_form.clone()),
            confidence: EXACT_MATCH_CONFIDENCE,
            reasoning: reasoning.unwrap_or_else(|| "Exact match".to_string()),
            is_valid: true,
        };
    }

    match best_fuzzy_option(&field.options, &value) {
        Some((option, score)) if score > FUZZY_MATCH_THRESHOLD => AttributeDetail {
            value: Some(option.short_form.clone()),
            confidence: score * FUZZY_CONFIDENCE_FACTOR,
            reasoning: reasoning.unwrap_or_else(|| {
                format!("Fuzzy match '{}' -> '{}' (score {:.2})", value, option.short_form, score)
            }),
            is_valid: true,
        },
        _ => {
            errors.push(format!("Invalid '{}': '{}' not in options", field.label, value));
            AttributeDetail::rejected(format!("'{}' is not an allowed value", value))
        }
    }
}

fn exact_option<'a>(options: &'a [FieldOption], value: &str) -> Option<&'a FieldOption> {
    let needle = value.trim().to_lowercase();
    options.iter().find(|o| {
        o.short_form.to_lowercase() == needle || o.full_form.to_lowercase() == needle
    })
}

/// Best scoring option against both forms. Ties keep the earlier option.
fn best_fuzzy_option<'a>(options: &'a [FieldOption], value: &str) -> Option<(&'a FieldOption, f64)> {
    let mut best: Option<(&FieldOption, f64)> = None;
    for option in options {
        let score = similarity(value, &option.short_form).max(similarity(value, &option.full_form));
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((option, score)),
        }
    }
    best
}

fn mean_confidence(attributes: &BTreeMap<String, AttributeDetail>) -> f64 {
    if attributes.is_empty() {
        return 0.0;
    }
    let sum: f64 = attributes.values().map(|d| d.confidence).sum();
    (sum / attributes.len() as f64).clamp(0.0, 1.0)
}

fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn collect_discoveries(
    raw: Vec<RawDiscovery>,
    fields: &[AttributeFieldSpec],
) -> Vec<DiscoveryObservation> {
    raw.into_iter()
        .filter_map(|d| {
            let key = normalize_key(&d.key);
            if key.is_empty() || fields.iter().any(|f| f.key == key) {
                return None;
            }

            let raw_value = d.value.render().trim().to_string();
            let confidence = d.confidence.unwrap_or(DEFAULT_DISCOVERY_CONFIDENCE);
            // Fractions in (0, 1] are read as probabilities.
            let confidence = if confidence > 0.0 && confidence <= 1.0 {
                confidence * 100.0
            } else {
                confidence
            };

            Some(DiscoveryObservation {
                label: d
                    .label
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| label_from_key(&key)),
                normalized_value: normalize_value(&raw_value),
                raw_value,
                confidence: confidence.clamp(0.0, 100.0).round() as u8,
                reasoning: d.reasoning.unwrap_or_default(),
                suggested_type: d.suggested_type.unwrap_or(FieldType::Text),
                key,
            })
        })
        .collect()
}
