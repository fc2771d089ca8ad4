use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConstituencyRow {
    pub id: Uuid,
    pub name: String,
    pub district: Option<String>,
    pub registered_voters: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// One candidate's tally in one election cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ElectionResultRow {
    pub id: Uuid,
    pub constituency_id: Uuid,
    pub year: i32,
    pub party: String,
    pub candidate_name: String,
    pub votes: i32,
    pub is_winner: bool,
}

/// A poll reading. `constituency_id` is NULL for national polls.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PollRow {
    pub id: Uuid,
    pub constituency_id: Option<Uuid>,
    pub pollster: String,
    pub party: String,
    pub percentage: f64,
    pub sample_size: Option<i32>,
    pub conducted_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub constituency_id: Uuid,
    pub name: String,
    pub party: String,
    pub is_incumbent: bool,
    pub bio: Option<String>,
}
