use std::sync::Arc;

use sqlx::PgPool;

use crate::llm_client::ModelInvoker;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only election data.
    pub db: PgPool,
    /// Model backend used by every prediction flow.
    pub llm: Arc<dyn ModelInvoker>,
}
