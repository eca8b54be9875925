//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local use.

use std::env;
use std::str::FromStr;

/// Strava caps `per_page` at 200.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Upper bound on the history window (about a century).
pub const MAX_HISTORY_WINDOW_DAYS: u32 = 36_500;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava credentials ---
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Long-lived refresh token (from the OAuth helper)
    pub strava_refresh_token: Option<String>,
    /// Pre-issued access token, validated before use
    pub strava_access_token: Option<String>,

    // --- Endpoints ---
    /// Strava REST API base, e.g. `https://www.strava.com/api/v3`
    pub strava_api_base_url: String,
    /// OAuth token endpoint
    pub strava_token_url: String,
    /// Timeout for each outbound request
    pub http_timeout_secs: u64,

    // --- Server ---
    /// Dashboard UI origin (allowed by CORS)
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Pipeline ---
    /// Only activities newer than this many days are fetched and kept
    pub history_window_days: u32,
    /// Upper bound on activities pages requested per load
    pub max_pages: u32,
    /// Activities per page (1..=200)
    pub page_size: u32,
    /// How long a successful load is served from cache
    pub cache_ttl_seconds: u64,
    /// Sport filter applied when a request does not name one ("All" disables it)
    pub default_sport_filter: String,
    /// Distance bucket boundaries in km, strictly increasing
    pub distance_bucket_edges: Vec<f64>,
}

impl Config {
    /// Config for tests; no credentials are real.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: Some("test_refresh_token".to_string()),
            strava_access_token: None,
            strava_api_base_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_token_url: "http://127.0.0.1:9/oauth/token".to_string(),
            http_timeout_secs: 10,
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            history_window_days: 730,
            max_pages: 5,
            page_size: 200,
            cache_ttl_seconds: 3600,
            default_sport_filter: "Run".to_string(),
            distance_bucket_edges: vec![5.0, 10.0, 15.0, 20.0],
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let strava_refresh_token = optional_var("STRAVA_REFRESH_TOKEN");
        let strava_access_token = optional_var("STRAVA_ACCESS_TOKEN");
        if strava_refresh_token.is_none() && strava_access_token.is_none() {
            return Err(ConfigError::Missing(
                "STRAVA_REFRESH_TOKEN or STRAVA_ACCESS_TOKEN",
            ));
        }

        let config = Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_refresh_token,
            strava_access_token,
            strava_api_base_url: env::var("STRAVA_API_BASE_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_token_url: env::var("STRAVA_TOKEN_URL")
                .unwrap_or_else(|_| "https://www.strava.com/oauth/token".to_string()),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 10)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_var("PORT", 8080)?,
            history_window_days: parse_var("HISTORY_WINDOW_DAYS", 730)?,
            max_pages: parse_var("MAX_PAGES", 5)?,
            page_size: parse_var("PAGE_SIZE", MAX_PAGE_SIZE)?,
            cache_ttl_seconds: parse_var("CACHE_TTL_SECONDS", 3600)?,
            default_sport_filter: env::var("DEFAULT_SPORT_FILTER")
                .unwrap_or_else(|_| "Run".to_string()),
            distance_bucket_edges: match optional_var("DISTANCE_BUCKET_EDGES") {
                Some(raw) => parse_edges(&raw)?,
                None => vec![5.0, 10.0, 15.0, 20.0],
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that parsing alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                var: "PAGE_SIZE",
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        if self.history_window_days == 0 || self.history_window_days > MAX_HISTORY_WINDOW_DAYS {
            return Err(ConfigError::Invalid {
                var: "HISTORY_WINDOW_DAYS",
                reason: format!("must be between 1 and {}", MAX_HISTORY_WINDOW_DAYS),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_PAGES",
                reason: "must be at least 1".to_string(),
            });
        }
        crate::services::transform::DistanceBuckets::new(self.distance_bucket_edges.clone())?;
        Ok(())
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse "5,10,15,20" into km edges.
fn parse_edges(raw: &str) -> Result<Vec<f64>, ConfigError> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::Invalid {
                    var: "DISTANCE_BUCKET_EDGES",
                    reason: format!("{:?}: {}", part.trim(), e),
                })
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
