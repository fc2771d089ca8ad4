//! Constituency outcome: structured winner/margin prediction for one seat.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_client::schema::{FieldSpec, FieldType, OutputSchema, StructuredOutput};
use crate::llm_client::ModelInvoker;
use crate::prediction::prompts::{CONSTITUENCY_OUTCOME_SYSTEM, CONSTITUENCY_OUTCOME_TEMPLATE};
use crate::prediction::request::PredictionRequest;
use crate::prediction::{run_structured_flow, FlowResult, FlowSpec};

const CONSTITUENCY_OUTCOME_FLOW: FlowSpec = FlowSpec {
    name: "constituency_outcome",
    system: CONSTITUENCY_OUTCOME_SYSTEM,
    template: CONSTITUENCY_OUTCOME_TEMPLATE,
    required_fields: &["constituency"],
};

/// Everything the model gets to see about one constituency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstituencyOutcomeInput {
    #[serde(default)]
    pub constituency: String,
    #[serde(default)]
    pub election_year: Option<i32>,
    #[serde(default)]
    pub historical_results: Value,
    #[serde(default)]
    pub polling_data: Value,
    #[serde(default)]
    pub candidates: Value,
    #[serde(default)]
    pub news_summary: String,
}

impl ConstituencyOutcomeInput {
    fn to_request(&self) -> PredictionRequest {
        PredictionRequest::new()
            .with("constituency", self.constituency.trim())
            .with_optional("election_year", self.election_year.map(|y| y.to_string()))
            .with_json("historical_results", &self.historical_results)
            .with_json("polling_data", &self.polling_data)
            .with_json("candidates", &self.candidates)
            .with("news_summary", self.news_summary.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituencyOutcome {
    pub predicted_winner: String,
    /// 0–100.
    pub confidence_level: f64,
    pub analysis: String,
    /// Percentage points.
    pub predicted_margin: f64,
}

impl StructuredOutput for ConstituencyOutcome {
    fn schema() -> OutputSchema {
        OutputSchema::new(vec![
            FieldSpec::required(
                "predicted_winner",
                FieldType::String,
                "Party or candidate expected to win the seat",
            ),
            FieldSpec::required(
                "confidence_level",
                FieldType::Number,
                "Confidence in the prediction, 0 to 100",
            ),
            FieldSpec::required(
                "analysis",
                FieldType::String,
                "Reasoning behind the prediction",
            ),
            FieldSpec::required(
                "predicted_margin",
                FieldType::Number,
                "Expected winning margin in percentage points",
            ),
        ])
    }
}

/// Predicts the outcome in a single constituency.
/// Returns `FlowResult::Error` if the model output is missing or malformed.
pub async fn analyze_constituency_outcome(
    invoker: &dyn ModelInvoker,
    input: &ConstituencyOutcomeInput,
) -> FlowResult<ConstituencyOutcome> {
    let request = input.to_request();
    run_structured_flow::<ConstituencyOutcome>(invoker, &CONSTITUENCY_OUTCOME_FLOW, &request)
        .await
        .map(|outcome| ConstituencyOutcome {
            confidence_level: outcome.confidence_level.clamp(0.0, 100.0),
            predicted_margin: outcome.predicted_margin.abs(),
            ..outcome
        })
}
