//! Article summary: a short neutral digest of a news article.

use serde::{Deserialize, Serialize};

use crate::llm_client::ModelInvoker;
use crate::prediction::prompts::{SUMMARY_SYSTEM, SUMMARY_TEMPLATE};
use crate::prediction::request::PredictionRequest;
use crate::prediction::{run_text_flow, FlowSpec};

/// Returned when no summary could be produced.
pub const SUMMARY_FALLBACK: &str = "";

const SUMMARY_FLOW: FlowSpec = FlowSpec {
    name: "summarize_article",
    system: SUMMARY_SYSTEM,
    template: SUMMARY_TEMPLATE,
    required_fields: &["article"],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub article: String,
}

/// Summarizes an article. Falls back to `SUMMARY_FALLBACK` on any failure.
pub async fn summarize_article(invoker: &dyn ModelInvoker, input: &SummaryInput) -> String {
    let request = PredictionRequest::new()
        .with("title", input.title.trim())
        .with("article", input.article.trim());

    run_text_flow(
        invoker,
        &SUMMARY_FLOW,
        &request,
        SUMMARY_FALLBACK.to_string(),
        |text| text.trim().to_string(),
    )
    .await
}
