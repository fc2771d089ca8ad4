//! Volatility index: a 0–100 score for how swing-prone a constituency is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_client::ModelInvoker;
use crate::prediction::parser::{parse_score, NUMBER_FALLBACK};
use crate::prediction::prompts::{VOLATILITY_SYSTEM, VOLATILITY_TEMPLATE};
use crate::prediction::request::PredictionRequest;
use crate::prediction::{run_text_flow, FlowSpec};

/// Returned when the index could not be computed.
pub const VOLATILITY_FALLBACK: f64 = NUMBER_FALLBACK;

const VOLATILITY_FLOW: FlowSpec = FlowSpec {
    name: "volatility_index",
    system: VOLATILITY_SYSTEM,
    template: VOLATILITY_TEMPLATE,
    required_fields: &["constituency"],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolatilityInput {
    #[serde(default)]
    pub constituency: String,
    /// Any JSON shape; strings are passed through untouched.
    #[serde(default)]
    pub historical_results: Value,
}

/// Asks the model for a volatility index and reads a number out of its reply.
///
/// The result is always finite and within `[0, 100]`. Blank input or any
/// backend failure yields `VOLATILITY_FALLBACK`.
pub async fn calculate_volatility_index(
    invoker: &dyn ModelInvoker,
    input: &VolatilityInput,
) -> f64 {
    let request = PredictionRequest::new()
        .with("constituency", input.constituency.trim())
        .with_json("historical_results", &input.historical_results);

    run_text_flow(
        invoker,
        &VOLATILITY_FLOW,
        &request,
        VOLATILITY_FALLBACK,
        parse_score,
    )
    .await
}
