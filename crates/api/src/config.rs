//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Resolution
    /// TTL for the resolution cache, in seconds.
    pub cache_ttl_secs: u64,
    /// Scheme used when redirecting a request to its canonical domain.
    pub canonical_redirect_scheme: String,
    /// Where to send requests whose host resolves to no site. None means 404.
    pub fallback_redirect_url: Option<String>,

    // Site context
    /// Default site id for units of work that never set one.
    pub default_site_id: Option<i64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            cache_ttl_secs: env::var("RESOLUTION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            canonical_redirect_scheme: env::var("CANONICAL_REDIRECT_SCHEME")
                .unwrap_or_else(|_| "https".to_string()),
            fallback_redirect_url: env::var("FALLBACK_REDIRECT_URL").ok(),

            default_site_id: match env::var("DEFAULT_SITE_ID") {
                Ok(raw) => Some(
                    raw.parse()
                        .map_err(|_| ConfigError::Invalid("DEFAULT_SITE_ID must be an integer"))?,
                ),
                Err(_) => None,
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
