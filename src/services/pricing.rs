//! Static price table for vision-capable chat models.
//!
//! Rates are USD per 1000 tokens. Models missing from the table are
//! treated as free so that cost reporting never blocks an extraction.

use crate::models::extraction::TokenUsage;

/// Share of a bare token total attributed to the prompt.
const INPUT_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub model_id: &'static str,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
    /// Applied on top of token cost for image requests.
    pub vision_multiplier: f64,
}

pub const MODEL_PRICING: &[ModelPricing] = &[
    ModelPricing { model_id: "gpt-4o", input_per_1k: 0.0025, output_per_1k: 0.01, vision_multiplier: 1.0 },
    ModelPricing { model_id: "gpt-4o-mini", input_per_1k: 0.00015, output_per_1k: 0.0006, vision_multiplier: 1.0 },
    ModelPricing { model_id: "gpt-4-turbo", input_per_1k: 0.01, output_per_1k: 0.03, vision_multiplier: 1.0 },
    ModelPricing { model_id: "gpt-4-vision-preview", input_per_1k: 0.01, output_per_1k: 0.03, vision_multiplier: 1.2 },
    ModelPricing { model_id: "claude-3-5-sonnet", input_per_1k: 0.003, output_per_1k: 0.015, vision_multiplier: 1.0 },
    ModelPricing { model_id: "claude-3-haiku", input_per_1k: 0.00025, output_per_1k: 0.00125, vision_multiplier: 1.0 },
    ModelPricing { model_id: "gemini-1.5-pro", input_per_1k: 0.00125, output_per_1k: 0.005, vision_multiplier: 1.0 },
    ModelPricing { model_id: "gemini-1.5-flash", input_per_1k: 0.000075, output_per_1k: 0.0003, vision_multiplier: 1.0 },
    ModelPricing { model_id: "llava-1.5-7b", input_per_1k: 0.0002, output_per_1k: 0.0002, vision_multiplier: 1.5 },
];

pub fn lookup(model_id: &str) -> Option<&'static ModelPricing> {
    MODEL_PRICING.iter().find(|p| p.model_id == model_id)
}

/// Estimate the token cost of a request in USD.
///
/// Explicit input/output counts win; a bare total is split 60/40.
pub fn estimate_cost(model_id: &str, usage: &TokenUsage) -> f64 {
    let Some(pricing) = lookup(model_id) else {
        return 0.0;
    };

    let (input, output) = match (usage.input_tokens, usage.output_tokens, usage.total_tokens) {
        (None, None, Some(total)) => {
            let total = f64::from(total);
            (total * INPUT_SHARE, total * (1.0 - INPUT_SHARE))
        }
        (input, output, _) => (
            f64::from(input.unwrap_or(0)),
            f64::from(output.unwrap_or(0)),
        ),
    };

    (input / 1000.0) * pricing.input_per_1k + (output / 1000.0) * pricing.output_per_1k
}

/// Token cost with the model's vision multiplier applied.
pub fn estimate_vision_cost(model_id: &str, usage: &TokenUsage) -> f64 {
    let multiplier = lookup(model_id).map_or(1.0, |p| p.vision_multiplier);
    estimate_cost(model_id, usage) * multiplier
}
