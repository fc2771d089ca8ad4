//! Numeric extraction from free-text model output.

use std::sync::LazyLock;

use regex::Regex;

/// Value returned when no number can be recovered from the text.
pub const NUMBER_FALLBACK: f64 = 0.0;

static DECIMAL_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

/// Float literal at the very start of the text: sign, digits or a leading
/// dot, optional exponent.
static LEADING_FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?").unwrap()
});

/// Reads a number out of model text.
///
/// Parses the longest float literal the trimmed text starts with, so
/// `".5 points"` is 0.5 and `"1e2 index"` is 100. If the text does not start
/// with one (or it is not finite), takes the first `\d+(\.\d+)?` match
/// anywhere in the text. With no match at all the result is `NUMBER_FALLBACK`.
/// Never returns NaN or infinity.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();

    if let Some(direct) = LEADING_FLOAT
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
    {
        return direct;
    }

    DECIMAL_NUMBER
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(NUMBER_FALLBACK)
}

/// `parse_number` bounded to the 0–100 index range.
pub fn parse_score(text: &str) -> f64 {
    parse_number(text).clamp(0.0, 100.0)
}
