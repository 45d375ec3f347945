use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Value type of an expected attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Select,
}

/// One allowed value of a controlled vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    /// Canonical compact code returned in results (e.g. "crew").
    #[garde(length(min = 1, max = 100))]
    pub short_form: String,

    /// Human readable label (e.g. "Crew Neck").
    #[garde(length(min = 1, max = 200))]
    pub full_form: String,
}

impl FieldOption {
    pub fn new(short_form: impl Into<String>, full_form: impl Into<String>) -> Self {
        Self {
            short_form: short_form.into(),
            full_form: full_form.into(),
        }
    }
}

/// An expected attribute of a category, supplied by the caller per request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFieldSpec {
    #[garde(length(min = 1, max = 64))]
    pub key: String,

    #[garde(length(min = 1, max = 200))]
    pub label: String,

    #[serde(rename = "type")]
    #[garde(skip)]
    pub field_type: FieldType,

    #[serde(default)]
    #[garde(skip)]
    pub required: bool,

    /// Controlled vocabulary. Fields without options are matched as free text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[garde(dive)]
    pub options: Vec<FieldOption>,
}

impl AttributeFieldSpec {
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: FieldType::Text,
            required: false,
            options: Vec::new(),
        }
    }

    pub fn select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<FieldOption>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: FieldType::Select,
            required: false,
            options,
        }
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_spec_deserializes_camel_case() {
        let spec: AttributeFieldSpec = serde_json::from_value(serde_json::json!({
            "key": "neckline",
            "label": "Neckline",
            "type": "select",
            "required": true,
            "options": [{"shortForm": "crew", "fullForm": "Crew Neck"}]
        }))
        .unwrap();

        assert_eq!(spec.field_type, FieldType::Select);
        assert!(spec.required);
        assert_eq!(spec.options[0], FieldOption::new("crew", "Crew Neck"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_option_rejected() {
        let spec = AttributeFieldSpec::select("fit", "Fit", vec![FieldOption::new("", "Slim")]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_field_type_from_str() {
        assert_eq!("boolean".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!(FieldType::Select.to_string(), "select");
    }
}
