//! National election predictions: overview plus per-seat outlook.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_client::schema::{FieldSpec, FieldType, OutputSchema, StructuredOutput};
use crate::llm_client::ModelInvoker;
use crate::prediction::prompts::{ELECTION_PREDICTIONS_SYSTEM, ELECTION_PREDICTIONS_TEMPLATE};
use crate::prediction::request::PredictionRequest;
use crate::prediction::{run_structured_flow, FlowResult, FlowSpec};

const ELECTION_PREDICTIONS_FLOW: FlowSpec = FlowSpec {
    name: "election_predictions",
    system: ELECTION_PREDICTIONS_SYSTEM,
    template: ELECTION_PREDICTIONS_TEMPLATE,
    required_fields: &["election_year"],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionPredictionsInput {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionPredictions {
    pub summary: String,
    pub detailed_predictions: String,
    /// 0–100.
    pub confidence_level: f64,
}

impl StructuredOutput for ElectionPredictions {
    fn schema() -> OutputSchema {
        OutputSchema::new(vec![
            FieldSpec::required("summary", FieldType::String, "National overview"),
            FieldSpec::required(
                "detailed_predictions",
                FieldType::String,
                "Constituency-by-constituency predictions",
            ),
            FieldSpec::required(
                "confidence_level",
                FieldType::Number,
                "Confidence in the overall result, 0 to 100",
            ),
        ])
    }
}

/// Generates national predictions for an election year.
pub async fn generate_election_predictions(
    invoker: &dyn ModelInvoker,
    input: &ElectionPredictionsInput,
) -> FlowResult<ElectionPredictions> {
    let request = PredictionRequest::new()
        .with_optional("election_year", input.election_year.map(|y| y.to_string()))
        .with_json("historical_results", &input.historical_results)
        .with_json("polling_data", &input.polling_data)
        .with_json("candidates", &input.candidates)
        .with("news_summary", input.news_summary.trim());

    run_structured_flow::<ElectionPredictions>(invoker, &ELECTION_PREDICTIONS_FLOW, &request)
        .await
        .map(|predictions| ElectionPredictions {
            confidence_level: predictions.confidence_level.clamp(0.0, 100.0),
            ..predictions
        })
}
