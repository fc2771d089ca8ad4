pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::prediction::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Flows over caller-supplied context
        .route(
            "/api/v1/predictions/news-impact",
            post(handlers::handle_news_impact),
        )
        .route("/api/v1/predictions/summary", post(handlers::handle_summary))
        .route(
            "/api/v1/predictions/constituency",
            post(handlers::handle_constituency_outcome),
        )
        .route(
            "/api/v1/predictions/election",
            post(handlers::handle_election_predictions),
        )
        .route(
            "/api/v1/predictions/volatility",
            post(handlers::handle_volatility),
        )
        // Flows over stored election data
        .route(
            "/api/v1/constituencies/:id/outcome",
            get(handlers::handle_stored_constituency_outcome),
        )
        .route(
            "/api/v1/constituencies/:id/volatility",
            get(handlers::handle_stored_volatility),
        )
        .route(
            "/api/v1/elections/:year/predictions",
            get(handlers::handle_stored_election_predictions),
        )
        .with_state(state)
}
