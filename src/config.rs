//! Environment-file driven configuration.
//!
//! All settings are read from the process environment, with `.env` loaded
//! first via dotenvy. Every knob has a default so a bare `docker compose up`
//! works out of the box; the generated `.env` file overrides the defaults.

use crate::types::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Hard ceiling on the writing agent context window. Configured values above
/// this produce "context too large" failures deep in the writing phase, so
/// reject them at startup instead.
pub const MAX_WRITING_AGENT_CONTEXT_CHARS: usize = 2_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub research: ResearchConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the local SQLite database file
    pub path: String,
    /// Directory for generated artifacts (captured web documents, etc.)
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_access_expiry: i64,
    pub jwt_refresh_expiry: i64,
    /// Default credential pair, seeded into the users table on first run
    pub admin_username: String,
    pub admin_password: String,
}

/// Research parameters surfaced in the settings UI. These are the defaults;
/// per-mission overrides arrive through `StartMissionRequest.research_params`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub writing_agent_max_context_chars: usize,
    pub main_research_doc_results: usize,
    pub main_research_web_results: usize,
    pub max_concurrent_requests: usize,
    pub web_search_cost_per_call: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible endpoint, normalized to the `/v1/` suffix convention
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let research = ResearchConfig {
            writing_agent_max_context_chars: parse_env(
                "WRITING_AGENT_MAX_CONTEXT_CHARS",
                300_000,
            )?,
            main_research_doc_results: parse_env("MAIN_RESEARCH_DOC_RESULTS", 5)?,
            main_research_web_results: parse_env("MAIN_RESEARCH_WEB_RESULTS", 5)?,
            max_concurrent_requests: parse_env("MAX_CONCURRENT_REQUESTS", 10)?,
            web_search_cost_per_call: parse_env("WEB_SEARCH_COST_PER_CALL", 0.005)?,
        };

        if research.writing_agent_max_context_chars > MAX_WRITING_AGENT_CONTEXT_CHARS {
            return Err(AppError::Configuration(format!(
                "writing_agent_max_context_chars={} exceeds the maximum of {}",
                research.writing_agent_max_context_chars, MAX_WRITING_AGENT_CONTEXT_CHARS
            )));
        }

        let base_url = env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env("PORT", 8000)?,
            },
            database: DatabaseConfig {
                path: env::var("MAESTRO_DB_PATH")
                    .unwrap_or_else(|_| "data/maestro.db".to_string()),
                data_dir: PathBuf::from(
                    env::var("MAESTRO_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
                ),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").map_err(|_| {
                    AppError::Configuration(
                        "JWT_SECRET must be set (generated by setup-env.sh)".to_string(),
                    )
                })?,
                jwt_access_expiry: parse_env("JWT_ACCESS_EXPIRY", 900)?,
                jwt_refresh_expiry: parse_env("JWT_REFRESH_EXPIRY", 604_800)?,
                admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                admin_password: env::var("ADMIN_PASSWORD")
                    .unwrap_or_else(|_| "pass123".to_string()),
            },
            research,
            provider: ProviderConfig {
                base_url: normalize_base_url(&base_url),
                api_key: env::var("LLM_API_KEY").ok(),
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            AppError::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Normalizes an OpenAI-compatible base URL to the expected `/v1/` suffix.
///
/// Most providers expose their OpenAI-compatible API under `/v1/`; GitHub
/// Models nests it under `/openai/v1/`. Users routinely paste the bare host,
/// so append the suffix rather than failing the first request.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');

    if trimmed.ends_with("/v1") {
        return format!("{}/", trimmed);
    }

    // GitHub Models serves the OpenAI-compatible surface under /openai/v1/
    if trimmed.contains("models.github.ai") || trimmed.contains("models.inference.ai.azure.com") {
        return format!("{}/openai/v1/", trimmed);
    }

    format!("{}/v1/", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_v1() {
        assert_eq!(
            normalize_base_url("https://api.openai.com"),
            "https://api.openai.com/v1/"
        );
        assert_eq!(
            normalize_base_url("http://localhost:11434/"),
            "http://localhost:11434/v1/"
        );
    }

    #[test]
    fn test_normalize_idempotent_on_v1() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/"
        );
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/"
        );
    }

    #[test]
    fn test_normalize_github_models() {
        assert_eq!(
            normalize_base_url("https://models.github.ai"),
            "https://models.github.ai/openai/v1/"
        );
    }
}
