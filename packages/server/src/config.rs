use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means tickets live in memory for the life of the process.
    pub database_url: Option<String>,
    pub port: u16,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub host_lookup_command: Option<String>,
    pub host_lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: non_empty(env::var("DATABASE_URL").ok()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            allowed_origins: parse_list(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
            host_lookup_command: non_empty(env::var("HOST_LOOKUP_COMMAND").ok()),
            host_lookup_timeout: Duration::from_secs(
                env::var("HOST_LOOKUP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("HOST_LOOKUP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
        .collect()
}
