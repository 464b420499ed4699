use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::analysis::client::{DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_TIMEOUT_SECS};
use crate::analysis::normalize::PromptVariant;
use crate::llm_client::{ResponseMode, DEFAULT_API_BASE, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub response_mode: ResponseMode,
    pub prompt_variant: PromptVariant,
    pub analysis_timeout: Duration,
    pub max_document_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            gemini_api_key: require("GEMINI_API_KEY")?,
            gemini_api_base: optional("GEMINI_API_BASE", DEFAULT_API_BASE),
            gemini_model: optional("GEMINI_MODEL", DEFAULT_MODEL),
            response_mode: parse_streaming(&optional("ANALYSIS_STREAMING", "false"))?,
            prompt_variant: optional("ANALYSIS_PROMPT_VARIANT", "detailed")
                .parse::<PromptVariant>()
                .map_err(|e| anyhow!(e))
                .context("ANALYSIS_PROMPT_VARIANT is invalid")?,
            analysis_timeout: Duration::from_secs(
                optional("ANALYSIS_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())
                    .parse::<u64>()
                    .context("ANALYSIS_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            max_document_bytes: optional(
                "MAX_DOCUMENT_BYTES",
                &DEFAULT_MAX_DOCUMENT_BYTES.to_string(),
            )
            .parse::<usize>()
            .context("MAX_DOCUMENT_BYTES must be a byte count")?,
            port: optional("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional("RUST_LOG", "info"),
        })
    }
}

fn parse_streaming(value: &str) -> Result<ResponseMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(ResponseMode::Streamed),
        "false" | "0" | "no" | "" => Ok(ResponseMode::Single),
        other => Err(anyhow!("ANALYSIS_STREAMING must be true or false, got '{other}'")),
    }
}
