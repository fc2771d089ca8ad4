//! Axum route handlers for the prediction flows.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::elections::context::{
    load_constituency_outcome_input, load_election_predictions_input, load_volatility_input,
};
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::prediction::constituency::{
    analyze_constituency_outcome, ConstituencyOutcome, ConstituencyOutcomeInput,
};
use crate::prediction::election::{
    generate_election_predictions, ElectionPredictions, ElectionPredictionsInput,
};
use crate::prediction::news_impact::{assess_news_impact, NewsImpactInput};
use crate::prediction::summarize::{summarize_article, SummaryInput};
use crate::prediction::volatility::{calculate_volatility_index, VolatilityInput};
use crate::prediction::FlowResult;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct NewsImpactResponse {
    pub assessment: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct VolatilityResponse {
    pub constituency: String,
    pub volatility_index: f64,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers: caller-supplied context
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/predictions/news-impact
pub async fn handle_news_impact(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewsImpactInput>,
) -> Result<Json<NewsImpactResponse>, AppError> {
    require_text(&input.article, "article")?;
    let assessment = assess_news_impact(state.llm.as_ref(), &input).await;
    Ok(Json(NewsImpactResponse { assessment }))
}

/// POST /api/v1/predictions/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    AppJson(input): AppJson<SummaryInput>,
) -> Result<Json<SummaryResponse>, AppError> {
    require_text(&input.article, "article")?;
    let summary = summarize_article(state.llm.as_ref(), &input).await;
    Ok(Json(SummaryResponse { summary }))
}

/// POST /api/v1/predictions/constituency
///
/// A degraded flow still answers 200 with `{"error": ...}`; only bad input is a 400.
pub async fn handle_constituency_outcome(
    State(state): State<AppState>,
    AppJson(input): AppJson<ConstituencyOutcomeInput>,
) -> Result<Json<FlowResult<ConstituencyOutcome>>, AppError> {
    require_text(&input.constituency, "constituency")?;
    let input = ConstituencyOutcomeInput {
        election_year: input.election_year.or_else(|| Some(current_year())),
        ..input
    };
    Ok(Json(
        analyze_constituency_outcome(state.llm.as_ref(), &input).await,
    ))
}

/// POST /api/v1/predictions/election
pub async fn handle_election_predictions(
    State(state): State<AppState>,
    AppJson(input): AppJson<ElectionPredictionsInput>,
) -> Json<FlowResult<ElectionPredictions>> {
    let input = ElectionPredictionsInput {
        election_year: input.election_year.or_else(|| Some(current_year())),
        ..input
    };
    Json(generate_election_predictions(state.llm.as_ref(), &input).await)
}

/// POST /api/v1/predictions/volatility
pub async fn handle_volatility(
    State(state): State<AppState>,
    AppJson(input): AppJson<VolatilityInput>,
) -> Result<Json<VolatilityResponse>, AppError> {
    require_text(&input.constituency, "constituency")?;
    let volatility_index = calculate_volatility_index(state.llm.as_ref(), &input).await;
    Ok(Json(VolatilityResponse {
        constituency: input.constituency,
        volatility_index,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers: context loaded from the election database
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/constituencies/:id/outcome?year=2026
pub async fn handle_stored_constituency_outcome(
    State(state): State<AppState>,
    Path(constituency_id): Path<Uuid>,
    Query(query): Query<YearQuery>,
) -> Result<Json<FlowResult<ConstituencyOutcome>>, AppError> {
    let year = query.year.unwrap_or_else(current_year);
    let input = load_constituency_outcome_input(&state.db, constituency_id, year)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Constituency {constituency_id} not found")))?;

    Ok(Json(
        analyze_constituency_outcome(state.llm.as_ref(), &input).await,
    ))
}

/// GET /api/v1/constituencies/:id/volatility
pub async fn handle_stored_volatility(
    State(state): State<AppState>,
    Path(constituency_id): Path<Uuid>,
) -> Result<Json<VolatilityResponse>, AppError> {
    let input = load_volatility_input(&state.db, constituency_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Constituency {constituency_id} not found")))?;

    let volatility_index = calculate_volatility_index(state.llm.as_ref(), &input).await;
    Ok(Json(VolatilityResponse {
        constituency: input.constituency,
        volatility_index,
    }))
}

/// GET /api/v1/elections/:year/predictions
pub async fn handle_stored_election_predictions(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<FlowResult<ElectionPredictions>>, AppError> {
    let input = load_election_predictions_input(&state.db, year).await?;
    Ok(Json(
        generate_election_predictions(state.llm.as_ref(), &input).await,
    ))
}
