// Shared prompt constants and prompt-building utilities.
// Each flow defines its own templates in prediction/prompts.rs.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model on the data it was given.
pub const GROUNDING_INSTRUCTION: &str = "\
    Base every statement on the election data provided below. \
    Do NOT invent vote counts, poll numbers, candidates or events. \
    If the data is missing or thin, say so and lower your confidence accordingly.";

/// Keeps analysis non-partisan.
pub const NEUTRALITY_INSTRUCTION: &str = "\
    You are a neutral electoral analyst. Do not endorse any party or candidate \
    and do not use loaded or campaign language.";
