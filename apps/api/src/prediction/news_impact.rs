//! News impact: a prose assessment of how a story may move voters.

use serde::{Deserialize, Serialize};

use crate::llm_client::ModelInvoker;
use crate::prediction::prompts::{NEWS_IMPACT_SYSTEM, NEWS_IMPACT_TEMPLATE};
use crate::prediction::request::PredictionRequest;
use crate::prediction::{run_text_flow, FlowSpec};

/// Returned when no assessment could be produced.
pub const NEWS_IMPACT_FALLBACK: &str = "";

const NEWS_IMPACT_FLOW: FlowSpec = FlowSpec {
    name: "news_impact",
    system: NEWS_IMPACT_SYSTEM,
    template: NEWS_IMPACT_TEMPLATE,
    required_fields: &["article"],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsImpactInput {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub article: String,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub parties: Vec<String>,
}

impl NewsImpactInput {
    fn to_request(&self) -> PredictionRequest {
        PredictionRequest::new()
            .with("headline", self.headline.trim())
            .with("article", self.article.trim())
            .with_optional("constituency", self.constituency.as_deref())
            .with("parties", self.parties.join(", "))
    }
}

/// Assesses the electoral impact of a news story.
/// Falls back to `NEWS_IMPACT_FALLBACK` on blank input or any model failure.
pub async fn assess_news_impact(invoker: &dyn ModelInvoker, input: &NewsImpactInput) -> String {
    run_text_flow(
        invoker,
        &NEWS_IMPACT_FLOW,
        &input.to_request(),
        NEWS_IMPACT_FALLBACK.to_string(),
        |text| text.trim().to_string(),
    )
    .await
}
