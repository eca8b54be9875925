// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and access-token lifecycle.
//!
//! Handles:
//! - Activity listing (one page per call)
//! - Refresh-token exchange
//! - Validation of a pre-issued access token
//! - Classification of Strava error bodies into auth/fetch errors

use crate::error::{AuthError, DataError, FetchErrorKind};
use crate::models::{Credential, RawActivity};
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
}

impl StravaClient {
    /// Create a client against the given API base and token endpoint.
    pub fn new(base_url: String, token_url: String, timeout: StdDuration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_url,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.strava_api_base_url.clone(),
            config.strava_token_url.clone(),
            StdDuration::from_secs(config.http_timeout_secs),
        )
    }

    /// List one page of the athlete's activities, newest first.
    ///
    /// Records that do not deserialize are reported in `skipped` instead of
    /// failing the page.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<ActivityPage, FetchErrorKind> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchErrorKind::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchErrorKind::Network(e.to_string()))?;

        if !status.is_success() {
            let kind = classify_fetch_error(status.as_u16(), &StravaErrorBody::parse(&body));
            if kind == FetchErrorKind::RateLimited {
                tracing::warn!(page, "Strava rate limit hit (429)");
            }
            return Err(kind);
        }

        let records: Vec<serde_json::Value> = serde_json::from_str(&body)
            .map_err(|e| FetchErrorKind::Malformed(format!("JSON parse error: {}", e)))?;

        Ok(ActivityPage::from_records(records))
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_token_error(status.as_u16(), &StravaErrorBody::parse(&body));
            tracing::error!(status = %status, error = %error, "Strava token refresh rejected");
            return Err(error);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(format!("Failed to parse token response: {}", e)))
    }

    /// Get authenticated athlete profile; used to validate an access token.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AuthError> {
        let url = format!("{}/athlete", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(
                status.as_u16(),
                &StravaErrorBody::parse(&body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(format!("JSON parse error: {}", e)))
    }
}

/// One page of `GET /athlete/activities`.
#[derive(Debug, Default)]
pub struct ActivityPage {
    pub activities: Vec<RawActivity>,
    /// Records present in the response, including skipped ones
    pub received: usize,
    pub skipped: Vec<DataError>,
}

impl ActivityPage {
    fn from_records(records: Vec<serde_json::Value>) -> Self {
        let mut page = ActivityPage {
            received: records.len(),
            ..Default::default()
        };

        for record in records {
            let id = record.get("id").and_then(|v| v.as_u64());
            match serde_json::from_value::<RawActivity>(record) {
                Ok(activity) => page.activities.push(activity),
                Err(e) => page.skipped.push(DataError::new(id, e.to_string())),
            }
        }

        page
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    /// Strava may rotate the refresh token on any exchange
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

/// Athlete summary from `GET /athlete`.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Strava's error envelope: `{"message": ..., "errors": [{resource, field, code}]}`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StravaErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<StravaFieldError>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct StravaFieldError {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: String,
}

impl StravaErrorBody {
    /// Parse an error body, keeping non-JSON bodies as the message.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| StravaErrorBody {
            message: body.trim().to_string(),
            errors: Vec::new(),
        })
    }

    /// "Authorization Error (AccessToken.activity:read_permission: missing)"
    pub fn summary(&self) -> String {
        let message = if self.message.is_empty() {
            "Unknown error"
        } else {
            self.message.as_str()
        };
        if self.errors.is_empty() {
            return message.to_string();
        }
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}.{}: {}", e.resource, e.field, e.code))
            .collect();
        format!("{} ({})", message, details.join(", "))
    }

    fn mentions_scope(&self) -> bool {
        self.message.to_ascii_lowercase().contains("scope")
            || self.errors.iter().any(|e| {
                let field = e.field.to_ascii_lowercase();
                field.contains("permission") || field.contains("scope")
            })
    }

    fn mentions_refresh_token(&self) -> bool {
        self.message.to_ascii_lowercase().contains("expired")
            || self
                .errors
                .iter()
                .any(|e| e.resource == "RefreshToken" || e.field == "refresh_token")
    }
}

/// Classify a rejected token exchange or token validation.
pub fn classify_token_error(status: u16, body: &StravaErrorBody) -> AuthError {
    let summary = body.summary();
    if body.mentions_scope() {
        AuthError::InsufficientScope(summary)
    } else if body.mentions_refresh_token() {
        AuthError::ExpiredRefreshToken(summary)
    } else if status == 429 || status >= 500 {
        AuthError::Unavailable(format!("HTTP {}: {}", status, summary))
    } else {
        AuthError::InvalidCredentials(summary)
    }
}

/// Classify a failed activities page.
pub fn classify_fetch_error(status: u16, body: &StravaErrorBody) -> FetchErrorKind {
    match status {
        429 => FetchErrorKind::RateLimited,
        401 | 403 if body.mentions_scope() => FetchErrorKind::InsufficientScope,
        401 => FetchErrorKind::Unauthorized,
        _ => FetchErrorKind::Http {
            status,
            message: body.summary(),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenManager - access token lifecycle for the single configured credential
// ─────────────────────────────────────────────────────────────────────────────

use crate::time_utils::{format_utc_rfc3339, Clock};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Owns the credential and hands out valid access tokens.
///
/// The credential mutex also serializes refreshes, so concurrent callers
/// never exchange the same refresh token twice.
pub struct TokenManager {
    client: StravaClient,
    credential: Mutex<Credential>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(client: StravaClient, credential: Credential, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            credential: Mutex::new(credential),
            clock,
        }
    }

    /// Get a valid (non-expired) access token.
    ///
    /// 1. Cached token expiring after now + margin: return it
    /// 2. Pre-issued token of unknown lifetime: validate against `/athlete`
    /// 3. Otherwise exchange the refresh token and cache the result
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        let mut credential = self.credential.lock().await;
        let now = self.clock.now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = credential.access_token.clone() {
            match credential.expires_at {
                Some(expires_at) if now + margin < expires_at => return Ok(token),
                Some(_) => {
                    tracing::info!("Access token expired or expiring soon, refreshing");
                }
                None => match self.client.get_athlete(&token).await {
                    Ok(athlete) => {
                        tracing::debug!(athlete_id = athlete.id, "Pre-issued access token is valid");
                        return Ok(token);
                    }
                    Err(e) if credential.refresh_token.is_none() => {
                        tracing::warn!(error = %e, "Pre-issued access token rejected and no refresh token configured");
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Pre-issued access token rejected, falling back to refresh token");
                        credential.access_token = None;
                    }
                },
            }
        }

        self.refresh(&mut credential, now).await
    }

    /// Forget the cached access token so the next call refreshes.
    pub async fn invalidate_access_token(&self) {
        let mut credential = self.credential.lock().await;
        credential.access_token = None;
        credential.expires_at = None;
    }

    async fn refresh(
        &self,
        credential: &mut Credential,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let refresh_token = credential.refresh_token.clone().ok_or_else(|| {
            AuthError::InvalidCredentials("no refresh token configured".to_string())
        })?;

        let new_tokens = self
            .client
            .refresh_token(&credential.client_id, &credential.client_secret, &refresh_token)
            .await?;

        let expires_at = DateTime::from_timestamp(new_tokens.expires_at, 0).ok_or_else(|| {
            AuthError::Unavailable(format!(
                "token response has invalid expires_at {}",
                new_tokens.expires_at
            ))
        })?;
        if expires_at <= now {
            tracing::warn!(
                expires_at = %format_utc_rfc3339(expires_at),
                "Strava returned an already-expired access token"
            );
        }

        if let Some(rotated) = new_tokens.refresh_token.filter(|r| *r != refresh_token) {
            tracing::info!(
                "Strava rotated the refresh token; update STRAVA_REFRESH_TOKEN to keep it across restarts"
            );
            credential.refresh_token = Some(rotated);
        }

        credential.access_token = Some(new_tokens.access_token.clone());
        credential.expires_at = Some(expires_at);

        tracing::info!(
            expires_at = %format_utc_rfc3339(expires_at),
            "Token refreshed and cached"
        );
        Ok(new_tokens.access_token)
    }
}
