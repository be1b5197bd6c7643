//! Cost estimation from token usage and model pricing.
//!
//! Single source of truth for per-step cost telemetry. Rates are stored in
//! nanodollars per 1000 tokens (1 USD = 1_000_000_000 nanodollars) to avoid
//! floating-point rounding in the table itself; the result surfaces as USD.
//! Cost is advisory telemetry only and never drives control flow.

use crate::engine::types::Provider;

/// Model pricing in nanodollars per 1000 tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_nano_per_1k: u64,
    pub output_nano_per_1k: u64,
}

const fn pricing(input_nano_per_1k: u64, output_nano_per_1k: u64) -> ModelPricing {
    ModelPricing {
        input_nano_per_1k,
        output_nano_per_1k,
    }
}

/// Normalize model names to canonical form for pricing lookup.
fn normalize_model(model: &str) -> &str {
    let trimmed = model.trim();
    match trimmed {
        s if s.contains("gpt-4o-mini") => "gpt-4o-mini",
        s if s.contains("gpt-4o") => "gpt-4o",
        s if s.contains("gpt-4-turbo") => "gpt-4-turbo",
        s if s.contains("claude-3-5-sonnet") || s.contains("claude-3.5-sonnet") => {
            "claude-3-5-sonnet"
        }
        s if s.contains("claude-sonnet-4") || s.contains("claude-4-sonnet") => "claude-sonnet-4",
        s if s.contains("claude-3-5-haiku") || s.contains("claude-3.5-haiku") => "claude-3-5-haiku",
        s if s.contains("claude-opus-4") || s.contains("claude-4-opus") => "claude-opus-4",
        s if s.contains("gemini-2.5-pro") || s.contains("gemini-2-5-pro") => "gemini-2.5-pro",
        s if s.contains("gemini-2.5-flash") || s.contains("gemini-2-5-flash") => "gemini-2.5-flash",
        s if s.contains("gemini-1.5-pro") || s.contains("gemini-1-5-pro") => "gemini-1.5-pro",
        s if s.contains("gemini-1.5-flash") || s.contains("gemini-1-5-flash") => "gemini-1.5-flash",
        _ => trimmed,
    }
}

/// Pricing for a known model. `None` for unrecognized names.
///
/// Rates per 1M tokens converted to nanodollars per 1k tokens:
/// $3/1M input = 3_000_000 nanodollars per 1k tokens.
pub fn pricing_for_model(model: &str) -> Option<ModelPricing> {
    match normalize_model(model) {
        // OpenAI
        "gpt-4o" => Some(pricing(2_500_000, 10_000_000)),
        "gpt-4o-mini" => Some(pricing(150_000, 600_000)),
        "gpt-4-turbo" => Some(pricing(10_000_000, 30_000_000)),
        // Anthropic
        "claude-3-5-sonnet" => Some(pricing(3_000_000, 15_000_000)),
        "claude-sonnet-4" => Some(pricing(3_000_000, 15_000_000)),
        "claude-3-5-haiku" => Some(pricing(800_000, 4_000_000)),
        "claude-opus-4" => Some(pricing(15_000_000, 75_000_000)),
        // Google
        "gemini-2.5-pro" => Some(pricing(1_250_000, 10_000_000)),
        "gemini-2.5-flash" => Some(pricing(150_000, 600_000)),
        "gemini-1.5-pro" => Some(pricing(1_250_000, 5_000_000)),
        "gemini-1.5-flash" => Some(pricing(75_000, 300_000)),
        _ => None,
    }
}

/// Fallback rate used when a model name is not in the table.
fn default_pricing_for_provider(provider: Provider) -> ModelPricing {
    match provider {
        Provider::OpenAi => pricing(2_500_000, 10_000_000),
        Provider::Anthropic => pricing(3_000_000, 15_000_000),
        Provider::Google => pricing(1_250_000, 10_000_000),
    }
}

/// Estimate the USD cost of a call from token counts.
///
/// Unknown model names fall back to the provider's default rate (with a
/// warning) rather than reporting zero, so telemetry stays roughly honest.
pub fn estimate_cost_usd(provider: Provider, model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    if tokens_in == 0 && tokens_out == 0 {
        return 0.0;
    }
    let rates = pricing_for_model(model).unwrap_or_else(|| {
        tracing::warn!(%provider, model = %model, "Unknown model for cost estimation, using provider default rate");
        default_pricing_for_provider(provider)
    });
    let nano = tokens_in.saturating_mul(rates.input_nano_per_1k) / 1000
        + tokens_out.saturating_mul(rates.output_nano_per_1k) / 1000;
    nano as f64 / 1_000_000_000.0
}
