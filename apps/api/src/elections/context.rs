//! Turns stored election rows into the JSON context the prediction prompts expect.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::elections::models::{CandidateRow, ConstituencyRow, ElectionResultRow, PollRow};
use crate::elections::repository;
use crate::prediction::constituency::ConstituencyOutcomeInput;
use crate::prediction::election::ElectionPredictionsInput;
use crate::prediction::volatility::VolatilityInput;

/// Polls included in a prompt.
const POLL_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct PartyShare {
    pub party: String,
    pub candidate: String,
    pub votes: i32,
    pub share_pct: f64,
}

/// One election cycle in one constituency.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub year: i32,
    pub winner_party: String,
    pub winner_candidate: String,
    /// Gap between first and second place, in percentage points of votes cast.
    pub winning_margin_pct: f64,
    pub total_votes: i64,
    pub results: Vec<PartyShare>,
}

/// Groups result rows by year. The winner is the row flagged `is_winner`,
/// or the top vote-getter when no row is flagged.
pub fn summarize_cycles(results: &[ElectionResultRow]) -> Vec<CycleSummary> {
    let mut by_year: BTreeMap<i32, Vec<&ElectionResultRow>> = BTreeMap::new();
    for row in results {
        by_year.entry(row.year).or_default().push(row);
    }

    by_year
        .into_iter()
        .map(|(year, mut rows)| {
            rows.sort_by(|a, b| b.votes.cmp(&a.votes));
            let total_votes: i64 = rows.iter().map(|r| r.votes as i64).sum();
            let share = |votes: i32| {
                if total_votes == 0 {
                    0.0
                } else {
                    round1(votes as f64 / total_votes as f64 * 100.0)
                }
            };

            let winner = rows.iter().find(|r| r.is_winner).or(rows.first()).copied();
            let first = rows.first().map(|r| r.votes).unwrap_or(0);
            let second = rows.get(1).map(|r| r.votes).unwrap_or(0);

            CycleSummary {
                year,
                winner_party: winner.map(|w| w.party.clone()).unwrap_or_default(),
                winner_candidate: winner.map(|w| w.candidate_name.clone()).unwrap_or_default(),
                winning_margin_pct: share(first - second),
                total_votes,
                results: rows
                    .iter()
                    .map(|r| PartyShare {
                        party: r.party.clone(),
                        candidate: r.candidate_name.clone(),
                        votes: r.votes,
                        share_pct: share(r.votes),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Number of consecutive cycles in which the winning party changed.
pub fn count_seat_changes(cycles: &[CycleSummary]) -> usize {
    cycles
        .windows(2)
        .filter(|pair| pair[0].winner_party != pair[1].winner_party)
        .count()
}

pub fn historical_results_json(results: &[ElectionResultRow]) -> Value {
    if results.is_empty() {
        return Value::Null;
    }
    let cycles = summarize_cycles(results);
    json!({
        "seat_changed_hands": count_seat_changes(&cycles),
        "cycles": cycles,
    })
}

pub fn polling_json(polls: &[PollRow]) -> Value {
    if polls.is_empty() {
        return Value::Null;
    }
    Value::Array(
        polls
            .iter()
            .map(|p| {
                let scope = if p.constituency_id.is_some() {
                    "constituency"
                } else {
                    "national"
                };
                json!({
                    "pollster": p.pollster,
                    "party": p.party,
                    "percentage": p.percentage,
                    "sample_size": p.sample_size,
                    "conducted_on": p.conducted_on,
                    "scope": scope,
                })
            })
            .collect(),
    )
}

pub fn candidates_json(candidates: &[CandidateRow]) -> Value {
    if candidates.is_empty() {
        return Value::Null;
    }
    Value::Array(
        candidates
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "party": c.party,
                    "is_incumbent": c.is_incumbent,
                    "bio": c.bio,
                })
            })
            .collect(),
    )
}

/// Per-constituency history keyed by constituency name.
pub fn national_results_json(
    constituencies: &[ConstituencyRow],
    results: &[ElectionResultRow],
) -> Value {
    let mut by_constituency: HashMap<Uuid, Vec<ElectionResultRow>> = HashMap::new();
    for row in results {
        by_constituency
            .entry(row.constituency_id)
            .or_default()
            .push(row.clone());
    }

    let mut national = serde_json::Map::new();
    for constituency in constituencies {
        let rows = by_constituency
            .get(&constituency.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        national.insert(constituency.name.clone(), historical_results_json(rows));
    }
    Value::Object(national)
}

/// Loads everything the constituency-outcome flow needs.
/// Returns `None` when the constituency does not exist.
pub async fn load_constituency_outcome_input(
    pool: &PgPool,
    constituency_id: Uuid,
    election_year: i32,
) -> Result<Option<ConstituencyOutcomeInput>, sqlx::Error> {
    let Some(constituency) = repository::get_constituency(pool, constituency_id).await? else {
        return Ok(None);
    };

    let results = repository::get_historical_results(pool, constituency_id).await?;
    let polls = repository::get_recent_polls(pool, Some(constituency_id), POLL_LIMIT).await?;
    let candidates = repository::get_candidates(pool, constituency_id).await?;

    info!(
        "Loaded context for {}: {} results, {} polls, {} candidates",
        constituency.name,
        results.len(),
        polls.len(),
        candidates.len()
    );

    Ok(Some(ConstituencyOutcomeInput {
        constituency: constituency.name,
        election_year: Some(election_year),
        historical_results: historical_results_json(&results),
        polling_data: polling_json(&polls),
        candidates: candidates_json(&candidates),
        news_summary: String::new(),
    }))
}

/// Loads the history the volatility flow needs.
/// Returns `None` when the constituency does not exist.
pub async fn load_volatility_input(
    pool: &PgPool,
    constituency_id: Uuid,
) -> Result<Option<VolatilityInput>, sqlx::Error> {
    let Some(constituency) = repository::get_constituency(pool, constituency_id).await? else {
        return Ok(None);
    };
    let results = repository::get_historical_results(pool, constituency_id).await?;

    Ok(Some(VolatilityInput {
        constituency: constituency.name,
        historical_results: historical_results_json(&results),
    }))
}

/// Loads national context for the election-predictions flow.
pub async fn load_election_predictions_input(
    pool: &PgPool,
    election_year: i32,
) -> Result<ElectionPredictionsInput, sqlx::Error> {
    let constituencies = repository::list_constituencies(pool).await?;
    let results = repository::get_all_results(pool).await?;
    let polls = repository::get_recent_polls(pool, None, POLL_LIMIT).await?;
    let candidates = repository::get_all_candidates(pool).await?;

    let names: HashMap<Uuid, &str> = constituencies
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let candidates_by_seat: Vec<Value> = candidates
        .iter()
        .map(|c| {
            json!({
                "constituency": names.get(&c.constituency_id).copied().unwrap_or("unknown"),
                "name": c.name,
                "party": c.party,
                "is_incumbent": c.is_incumbent,
            })
        })
        .collect();

    Ok(ElectionPredictionsInput {
        election_year: Some(election_year),
        historical_results: national_results_json(&constituencies, &results),
        polling_data: polling_json(&polls),
        candidates: if candidates_by_seat.is_empty() {
            Value::Null
        } else {
            Value::Array(candidates_by_seat)
        },
        news_summary: String::new(),
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
