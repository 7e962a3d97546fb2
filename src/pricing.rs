//! Model pricing table and cost estimation.
//!
//! Rates are USD per 1000 tokens. Unknown models fall back to the gpt-4 tier
//! rather than failing, so cost accounting never aborts a run.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Per-1000-token input/output rates for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

const DEFAULT_MODEL: &str = "gpt-4";

static PRICING: OnceLock<HashMap<&'static str, ModelRates>> = OnceLock::new();

fn pricing_table() -> &'static HashMap<&'static str, ModelRates> {
    PRICING.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("gpt-4", ModelRates { input: 0.01, output: 0.03 });
        map.insert("gpt-4-1106-preview", ModelRates { input: 0.01, output: 0.03 });
        map.insert("gpt-3.5-turbo", ModelRates { input: 0.0015, output: 0.002 });
        map.insert("gpt-4o", ModelRates { input: 0.005, output: 0.015 });
        map.insert("gpt-4o-mini", ModelRates { input: 0.00015, output: 0.0006 });
        map
    })
}

/// Rates for a model, falling back to the default tier when unknown.
pub fn rates_for(model: &str) -> ModelRates {
    let table = pricing_table();
    table
        .get(model)
        .copied()
        .unwrap_or_else(|| table[DEFAULT_MODEL])
}

/// Estimated cost in USD for one call, rounded to 6 decimal places.
/// Pure function: no state, monotonically non-decreasing in both token counts.
pub fn estimate_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let rates = rates_for(model);
    let input_cost = (prompt_tokens as f64 / 1000.0) * rates.input;
    let output_cost = (completion_tokens as f64 / 1000.0) * rates.output;
    round6(input_cost + output_cost)
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}
