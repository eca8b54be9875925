// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paginated retrieval of the athlete's activities.

use crate::error::{DataError, FetchError};
use crate::models::RawActivity;
use crate::services::strava::StravaClient;

/// Pagination limits for one fetch cycle; also the result cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchParams {
    pub page_size: u32,
    pub max_pages: u32,
    pub history_window_days: u32,
}

impl FetchParams {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            history_window_days: config.history_window_days,
        }
    }
}

/// Everything one fetch cycle produced, including a failure if one occurred.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Activities from all successful pages, in the order received
    pub activities: Vec<RawActivity>,
    /// Pages that returned successfully
    pub pages_fetched: u32,
    /// Records that could not be deserialized
    pub skipped: Vec<DataError>,
    /// The page that aborted the fetch, if any
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Walks `GET /athlete/activities` page by page.
#[derive(Clone)]
pub struct ActivityFetcher {
    client: StravaClient,
}

impl ActivityFetcher {
    pub fn new(client: StravaClient) -> Self {
        Self { client }
    }

    /// Fetch activities newer than `after` (Unix seconds).
    ///
    /// Stops after `max_pages`, on an empty page, or on a short page. A
    /// failing page stops the walk; earlier pages are kept in the outcome.
    pub async fn fetch(&self, access_token: &str, after: i64, params: FetchParams) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for page in 1..=params.max_pages {
            let result = self
                .client
                .list_activities(access_token, after, page, params.page_size)
                .await;

            let mut fetched = match result {
                Ok(fetched) => fetched,
                Err(kind) => {
                    let error = FetchError::new(page, kind);
                    tracing::warn!(
                        page,
                        kept = outcome.activities.len(),
                        error = %error,
                        "Activity fetch aborted"
                    );
                    outcome.error = Some(error);
                    break;
                }
            };

            outcome.pages_fetched += 1;
            let received = fetched.received;
            tracing::debug!(page, received, "Fetched activities page");

            outcome.activities.append(&mut fetched.activities);
            outcome.skipped.append(&mut fetched.skipped);

            if received < params.page_size as usize {
                break;
            }
        }

        tracing::info!(
            pages = outcome.pages_fetched,
            activities = outcome.activities.len(),
            skipped = outcome.skipped.len(),
            complete = outcome.is_complete(),
            "Activity fetch finished"
        );

        outcome
    }
}
