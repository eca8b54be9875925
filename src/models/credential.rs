//! OAuth credential held by the token manager.

use chrono::{DateTime, Utc};

/// Strava OAuth credential for the single dashboard user.
///
/// Lives only in memory; `access_token` and `expires_at` change on each
/// refresh.
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    /// `None` for a pre-issued access token of unknown lifetime
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: Option<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            access_token,
            expires_at: None,
        }
    }
}

// Keep secrets out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_access_token", &self.access_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
