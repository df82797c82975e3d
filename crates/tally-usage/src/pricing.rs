//! Pricing - static per-model cost table and cost computation
//!
//! Prices are USD per 1000 tokens, split input/output. The table is
//! configuration data loaded at startup; models absent from it are valid
//! and cost zero.

use std::collections::HashMap;

/// Per-model price, USD per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    /// Price per 1000 prompt tokens
    pub input_per_1k: f64,
    /// Price per 1000 completion tokens
    pub output_per_1k: f64,
}

/// Round to `places` decimal places
#[must_use]
pub fn round_dp(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Static price table keyed by full model identifier (provider prefix included)
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPrice>,
}

/// Default pricing for the supported models (USD per 1K tokens)
fn default_prices() -> HashMap<String, ModelPrice> {
    let table: &[(&str, f64, f64)] = &[
        // OpenAI
        ("gpt-4o", 0.0025, 0.01),
        ("gpt-4o-mini", 0.00015, 0.0006),
        ("gpt-4-turbo", 0.01, 0.03),
        ("gpt-4", 0.03, 0.06),
        ("gpt-3.5-turbo", 0.0005, 0.0015),
        // Anthropic
        ("claude-3-5-sonnet-20241022", 0.003, 0.015),
        ("claude-3-5-haiku-20241022", 0.0008, 0.004),
        ("claude-3-opus-20240229", 0.015, 0.075),
        // Google Gemini
        ("gemini/gemini-1.5-pro", 0.00125, 0.005),
        ("gemini/gemini-1.5-flash", 0.000075, 0.0003),
        // Groq
        ("groq/llama-3.3-70b-versatile", 0.00059, 0.00079),
        ("groq/llama-3.1-70b-versatile", 0.00059, 0.00079),
        ("groq/llama-3.1-8b-instant", 0.00005, 0.00008),
    ];

    table
        .iter()
        .map(|(model, input, output)| {
            (
                (*model).to_string(),
                ModelPrice {
                    input_per_1k: *input,
                    output_per_1k: *output,
                },
            )
        })
        .collect()
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingTable {
    /// Create a table with the default price list
    #[must_use]
    pub fn new() -> Self {
        Self {
            prices: default_prices(),
        }
    }

    /// Look up the price for a model
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }

    /// Compute the USD cost of a request, rounded to 6 decimal places.
    ///
    /// Unknown models cost `0.0`; that is not an error.
    #[must_use]
    pub fn compute_cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        match self.prices.get(model) {
            Some(price) => {
                let input_cost = (prompt_tokens as f64 / 1000.0) * price.input_per_1k;
                let output_cost = (completion_tokens as f64 / 1000.0) * price.output_per_1k;
                round_dp(input_cost + output_cost, 6)
            }
            None => 0.0,
        }
    }
}
