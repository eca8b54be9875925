// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// What the user should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Remedy {
    /// Run the OAuth flow again to obtain a new refresh token.
    Reauthorize,
    /// Try again later; nothing is wrong with the credentials.
    Retry,
}

/// Refresh-token exchange (or token validation) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Strava rejected the client credentials: {0}")]
    InvalidCredentials(String),

    #[error("Strava token lacks the required scope: {0}")]
    InsufficientScope(String),

    #[error("Strava refresh token is expired or revoked: {0}")]
    ExpiredRefreshToken(String),

    #[error("Strava token endpoint unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn remedy(&self) -> Remedy {
        match self {
            AuthError::Unavailable(_) => Remedy::Retry,
            _ => Remedy::Reauthorize,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::InsufficientScope(_) => "insufficient_scope",
            AuthError::ExpiredRefreshToken(_) => "expired_refresh_token",
            AuthError::Unavailable(_) => "auth_unavailable",
        }
    }
}

/// Why a single activities page could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("access token rejected")]
    Unauthorized,

    #[error("access token lacks activity read permission")]
    InsufficientScope,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed page: {0}")]
    Malformed(String),
}

/// A failed page aborts pagination; `page` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch activities page {page}: {kind}")]
pub struct FetchError {
    pub page: u32,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(page: u32, kind: FetchErrorKind) -> Self {
        Self { page, kind }
    }

    pub fn remedy(&self) -> Remedy {
        match self.kind {
            FetchErrorKind::Unauthorized | FetchErrorKind::InsufficientScope => {
                Remedy::Reauthorize
            }
            _ => Remedy::Retry,
        }
    }
}

/// A raw activity record that could not be turned into a row.
///
/// Never fatal: the record is skipped and counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Skipping activity {}: {reason}", id_label(.id))]
pub struct DataError {
    pub id: Option<u64>,
    pub reason: String,
}

impl DataError {
    pub fn new(id: Option<u64>, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

fn id_label(id: &Option<u64>) -> String {
    id.map_or_else(|| "<no id>".to_string(), |id| id.to_string())
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn remedy(&self) -> Option<Remedy> {
        match self {
            AppError::Auth(e) => Some(e.remedy()),
            AppError::Fetch(e) => Some(e.remedy()),
            _ => None,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remedy: Option<Remedy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_page: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let remedy = self.remedy();
        let (status, error, details, failed_page) = match &self {
            AppError::Auth(err) => {
                tracing::warn!(error = %err, "Strava authentication failed");
                // An outage on Strava's side is not the caller's credentials.
                let status = match err {
                    AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::UNAUTHORIZED,
                };
                (
                    status,
                    err.code(),
                    Some(err.to_string()),
                    None,
                )
            }
            AppError::Fetch(err) => {
                tracing::warn!(page = err.page, error = %err, "Strava fetch failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "fetch_error",
                    Some(err.to_string()),
                    Some(err.page),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()), None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None, None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            remedy,
            failed_page,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
