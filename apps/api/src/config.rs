use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL, MAX_ATTEMPTS_CEILING};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    /// Total attempts per model call, including the first one.
    pub llm_max_retries: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 60)?),
            llm_max_retries: check_attempts(parse_env("LLM_MAX_RETRIES", 3)?)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn check_attempts(attempts: u32) -> Result<u32> {
    ensure!(
        (1..=MAX_ATTEMPTS_CEILING).contains(&attempts),
        "LLM_MAX_RETRIES must be between 1 and {MAX_ATTEMPTS_CEILING}, got {attempts}"
    );
    Ok(attempts)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("LUCIAN_VOTES_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("LUCIAN_VOTES_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_env("LUCIAN_VOTES_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
        std::env::remove_var("LUCIAN_VOTES_TEST_BAD_PORT");
    }

    #[test]
    fn test_parse_env_trims_whitespace() {
        std::env::set_var("LUCIAN_VOTES_TEST_RETRIES", " 5 ");
        let value: u32 = parse_env("LUCIAN_VOTES_TEST_RETRIES", 3).unwrap();
        assert_eq!(value, 5);
        std::env::remove_var("LUCIAN_VOTES_TEST_RETRIES");
    }

    #[test]
    fn test_attempts_outside_range_rejected() {
        assert_eq!(check_attempts(3).unwrap(), 3);
        assert_eq!(check_attempts(MAX_ATTEMPTS_CEILING).unwrap(), MAX_ATTEMPTS_CEILING);
        assert!(check_attempts(0).is_err());
        assert!(check_attempts(40).is_err());
    }
}
