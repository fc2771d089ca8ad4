//! Read-only queries over election data. The schema is owned elsewhere;
//! this service never writes to these tables.

use sqlx::PgPool;
use uuid::Uuid;

use crate::elections::models::{CandidateRow, ConstituencyRow, ElectionResultRow, PollRow};

pub async fn get_constituency(
    pool: &PgPool,
    constituency_id: Uuid,
) -> Result<Option<ConstituencyRow>, sqlx::Error> {
    sqlx::query_as::<_, ConstituencyRow>("SELECT * FROM constituencies WHERE id = $1")
        .bind(constituency_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_constituencies(pool: &PgPool) -> Result<Vec<ConstituencyRow>, sqlx::Error> {
    sqlx::query_as::<_, ConstituencyRow>("SELECT * FROM constituencies ORDER BY name")
        .fetch_all(pool)
        .await
}

/// All results for a constituency, oldest cycle first, strongest candidate first within a cycle.
pub async fn get_historical_results(
    pool: &PgPool,
    constituency_id: Uuid,
) -> Result<Vec<ElectionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, ElectionResultRow>(
        "SELECT * FROM election_results WHERE constituency_id = $1 ORDER BY year, votes DESC",
    )
    .bind(constituency_id)
    .fetch_all(pool)
    .await
}

pub async fn get_all_results(pool: &PgPool) -> Result<Vec<ElectionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, ElectionResultRow>(
        "SELECT * FROM election_results ORDER BY constituency_id, year, votes DESC",
    )
    .fetch_all(pool)
    .await
}

/// Most recent polls for a constituency plus national polls.
/// With `constituency_id = None` only national polls are returned.
pub async fn get_recent_polls(
    pool: &PgPool,
    constituency_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<PollRow>, sqlx::Error> {
    sqlx::query_as::<_, PollRow>(
        r#"
        SELECT * FROM polls
        WHERE constituency_id IS NULL OR constituency_id = $1
        ORDER BY conducted_on DESC
        LIMIT $2
        "#,
    )
    .bind(constituency_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_candidates(
    pool: &PgPool,
    constituency_id: Uuid,
) -> Result<Vec<CandidateRow>, sqlx::Error> {
    sqlx::query_as::<_, CandidateRow>(
        "SELECT * FROM candidates WHERE constituency_id = $1 ORDER BY party, name",
    )
    .bind(constituency_id)
    .fetch_all(pool)
    .await
}

pub async fn get_all_candidates(pool: &PgPool) -> Result<Vec<CandidateRow>, sqlx::Error> {
    sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates ORDER BY constituency_id, party")
        .fetch_all(pool)
        .await
}
