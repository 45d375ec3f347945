//! Structured instruction sent alongside the image.
//!
//! The wording may change freely; the contract is that every field is
//! listed with its key, label, type and (for controlled vocabularies) the
//! full `shortForm` / `fullForm` list, and that the model answers with a
//! single JSON object keyed by field key.

use std::fmt::Write;

use crate::models::schema::AttributeFieldSpec;
use crate::services::validation::NOT_VISIBLE;

pub fn build_prompt(fields: &[AttributeFieldSpec], discover: bool) -> String {
    let mut prompt = String::from(
        "You are a product attribute extraction system. Inspect the image and \
         report the attributes listed below.\n\nATTRIBUTES:\n",
    );

    for field in fields {
        let required = if field.required { ", required" } else { "" };
        let _ = writeln!(
            prompt,
            "- \"{}\" ({}; type: {}{})",
            field.key, field.label, field.field_type, required
        );
        if field.has_options() {
            prompt.push_str("  allowed values (answer with the code on the left):\n");
            for option in &field.options {
                let _ = writeln!(prompt, "    {} = {}", option.short_form, option.full_form);
            }
        }
    }

    let _ = write!(
        prompt,
        "\nRULES:\n\
         - For attributes with allowed values, answer with one code exactly as written.\n\
         - If an attribute cannot be determined from the image, answer \"{NOT_VISIBLE}\".\n\
         - Each answer may be a plain value or {{\"value\": ..., \"reasoning\": \"...\"}}.\n",
    );

    if discover {
        prompt.push_str(
            "- Also add a \"discoveries\" array describing clearly visible attributes that \
             are NOT listed above. Each entry: {\"key\": snake_case name, \"label\": \
             display name, \"value\": observed value, \"confidence\": 0-100, \
             \"reasoning\": short explanation, \"suggestedType\": \"text\" | \"number\" | \
             \"boolean\" | \"select\"}.\n",
        );
    }

    prompt.push_str(
        "\nRespond with ONLY a JSON object keyed by attribute key. No prose, no Markdown.",
    );
    prompt
}
