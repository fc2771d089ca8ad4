// All LLM prompt templates for the prediction flows.
// Placeholders are `{field_name}`; `render` fills them from a PredictionRequest.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, NEUTRALITY_INSTRUCTION};
use crate::prediction::request::PredictionRequest;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Fills every `{name}` placeholder in `template`.
///
/// Shared instruction fragments resolve first, then request fields. Anything
/// else becomes an empty string. Substituted values are not re-scanned.
pub fn render(template: &str, request: &PredictionRequest) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "grounding_instruction" => GROUNDING_INSTRUCTION.to_string(),
                "neutrality_instruction" => NEUTRALITY_INSTRUCTION.to_string(),
                _ => request.get(name).to_string(),
            }
        })
        .into_owned()
}

// ── News impact ─────────────────────────────────────────────────────────────

pub const NEWS_IMPACT_SYSTEM: &str = "You are an experienced Saint Lucian political analyst. \
    Assess how a news story is likely to affect voter sentiment. \
    Answer in plain prose, at most three short paragraphs.";

pub const NEWS_IMPACT_TEMPLATE: &str = r#"{neutrality_instruction}

Assess the likely electoral impact of the following news story.

HEADLINE: {headline}
CONSTITUENCY OF INTEREST: {constituency}
PARTIES TO CONSIDER: {parties}

ARTICLE:
{article}

Explain which parties or candidates gain or lose, which voter groups are most affected,
and whether the effect is likely to be short-lived or lasting."#;

// ── Constituency outcome ────────────────────────────────────────────────────

pub const CONSTITUENCY_OUTCOME_SYSTEM: &str =
    "You are an election forecaster for Saint Lucia's general elections.";

pub const CONSTITUENCY_OUTCOME_TEMPLATE: &str = r#"{grounding_instruction}

{neutrality_instruction}

Predict the outcome of the {election_year} general election in the constituency of {constituency}.

HISTORICAL RESULTS (by election year):
{historical_results}

RECENT POLLING:
{polling_data}

CANDIDATES:
{candidates}

RECENT NEWS SUMMARY:
{news_summary}

Return a JSON object with this EXACT schema (no extra fields):
{
  "predicted_winner": "party or candidate expected to win",
  "confidence_level": 65,
  "analysis": "two or three paragraphs explaining the prediction",
  "predicted_margin": 4.5
}

Rules:
- confidence_level is a number from 0 to 100
- predicted_margin is the expected winning margin in percentage points"#;

// ── National predictions ────────────────────────────────────────────────────

pub const ELECTION_PREDICTIONS_SYSTEM: &str =
    "You are an election forecaster producing a national outlook for Saint Lucia.";

pub const ELECTION_PREDICTIONS_TEMPLATE: &str = r#"{grounding_instruction}

{neutrality_instruction}

Produce predictions for the {election_year} general election across all 17 constituencies.

HISTORICAL RESULTS:
{historical_results}

POLLING DATA:
{polling_data}

CANDIDATES:
{candidates}

RECENT NEWS SUMMARY:
{news_summary}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "national overview in one paragraph",
  "detailed_predictions": "constituency-by-constituency predictions, one line each",
  "confidence_level": 60
}

confidence_level is a number from 0 to 100 describing confidence in the overall result."#;

// ── Article summary ─────────────────────────────────────────────────────────

pub const SUMMARY_SYSTEM: &str = "You summarize political news for a general audience. \
    Be factual and brief. Answer with the summary only.";

pub const SUMMARY_TEMPLATE: &str = r#"{neutrality_instruction}

Summarize the following article in no more than three sentences, keeping names,
numbers and constituencies that matter for the election.

TITLE: {title}

ARTICLE:
{article}"#;

// ── Volatility index ────────────────────────────────────────────────────────

pub const VOLATILITY_SYSTEM: &str = "You are a quantitative electoral analyst. \
    Respond with a single number between 0 and 100 and nothing else.";

pub const VOLATILITY_TEMPLATE: &str = r#"Calculate a volatility index for the constituency of {constituency}.

The index runs from 0 (the same party wins by similar margins every cycle)
to 100 (the seat changes hands every cycle with large swings).
Consider how often the winning party changed and how large the vote-share swings were.

HISTORICAL RESULTS:
{historical_results}

Respond with the number only."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_named_fields() {
        let request = PredictionRequest::new()
            .with("constituency", "Gros Islet")
            .with("historical_results", "[2016: UWP, 2021: SLP]");
        let prompt = render(VOLATILITY_TEMPLATE, &request);
        assert!(prompt.contains("constituency of Gros Islet."));
        assert!(prompt.contains("[2016: UWP, 2021: SLP]"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_render_missing_field_becomes_empty() {
        let prompt = render("A{missing}B", &PredictionRequest::new());
        assert_eq!(prompt, "AB");
    }

    #[test]
    fn test_render_leaves_json_example_braces_alone() {
        let prompt = render(CONSTITUENCY_OUTCOME_TEMPLATE, &PredictionRequest::new());
        assert!(prompt.contains("\"predicted_winner\": \"party or candidate expected to win\""));
        assert!(prompt.contains(GROUNDING_INSTRUCTION));
    }

    #[test]
    fn test_render_does_not_expand_placeholders_inside_values() {
        let request = PredictionRequest::new().with("article", "literal {headline} text");
        let prompt = render("{article}|{headline}", &request);
        assert_eq!(prompt, "literal {headline} text|");
    }

    #[test]
    fn test_every_template_renders_without_leftover_placeholders() {
        let templates = [
            NEWS_IMPACT_TEMPLATE,
            CONSTITUENCY_OUTCOME_TEMPLATE,
            ELECTION_PREDICTIONS_TEMPLATE,
            SUMMARY_TEMPLATE,
            VOLATILITY_TEMPLATE,
        ];
        for template in templates {
            let prompt = render(template, &PredictionRequest::new());
            assert!(!PLACEHOLDER.is_match(&prompt), "leftover placeholder in {prompt}");
        }
    }
}
