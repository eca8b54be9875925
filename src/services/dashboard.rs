// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard pipeline.
//!
//! Handles the full load:
//! 1. Serve from the result cache when fresh (unless a refresh is requested)
//! 2. Obtain a valid access token
//! 3. Fetch activity pages newer than the history window
//! 4. Normalize into rows and cache complete results
//!
//! and the pure view built from the loaded rows for each request.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::{Config, ConfigError};
use crate::error::{AppError, FetchErrorKind, Remedy, Result};
use crate::models::{ActivityRow, AggregateBucket, Credential, KpiSet, Period};
use crate::services::cache::ResultCache;
use crate::services::fetcher::{ActivityFetcher, FetchParams};
use crate::services::kpi::compute_kpis;
use crate::services::strava::{StravaClient, TokenManager};
use crate::services::transform::{
    aggregate_by_period, normalize_activities, DistanceBuckets, RowFilter, SportFilter,
};
use crate::time_utils::Clock;

/// Result cache keyed by fetch parameters.
pub type ActivityCache = ResultCache<FetchParams, LoadedActivities>;

/// How the last load went, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    /// A page failed after earlier pages succeeded; rows are incomplete.
    Partial {
        failed_page: u32,
        message: String,
        #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
        remedy: Remedy,
    },
}

/// Rows produced by one pipeline run.
#[derive(Debug, Clone)]
pub struct LoadedActivities {
    pub rows: Arc<Vec<ActivityRow>>,
    pub status: FetchStatus,
    /// Malformed records dropped during fetch or normalization
    pub skipped_records: usize,
    pub fetched_at: DateTime<Utc>,
    pub from_cache: bool,
}

/// Runs the token → fetch → normalize pipeline and owns the result cache.
pub struct DashboardService {
    tokens: TokenManager,
    fetcher: ActivityFetcher,
    cache: ActivityCache,
    params: FetchParams,
    buckets: DistanceBuckets,
    default_sport: SportFilter,
    clock: Arc<dyn Clock>,
    /// Serializes pipeline runs.
    load_lock: Mutex<()>,
}

impl DashboardService {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let client = StravaClient::from_config(config);
        let credential = Credential::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            config.strava_refresh_token.clone(),
            config.strava_access_token.clone(),
        );

        Ok(Self {
            tokens: TokenManager::new(client.clone(), credential, clock.clone()),
            fetcher: ActivityFetcher::new(client),
            cache: ResultCache::new(Duration::seconds(
                i64::try_from(config.cache_ttl_seconds)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            )),
            params: FetchParams::from_config(config),
            buckets: DistanceBuckets::new(config.distance_bucket_edges.clone())?,
            default_sport: SportFilter::parse(&config.default_sport_filter),
            clock,
            load_lock: Mutex::new(()),
        })
    }

    pub fn default_sport(&self) -> &SportFilter {
        &self.default_sport
    }

    pub fn bucket_labels(&self) -> &[String] {
        self.buckets.labels()
    }

    /// Reference date for KPI windows, in the clock's timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.clock.utc_offset())
            .date_naive()
    }

    pub fn cache(&self) -> &ActivityCache {
        &self.cache
    }

    /// Load rows, from cache when fresh.
    ///
    /// `refresh` drops the cached entry first and always runs a fetch cycle.
    /// Only complete loads are cached, so a partial result is retried on the
    /// next call.
    pub async fn load(&self, refresh: bool) -> Result<LoadedActivities> {
        let key = self.params;

        if refresh {
            self.cache.invalidate(&key);
            tracing::info!("Refresh requested, activity cache invalidated");
        } else if let Some(hit) = self.cache.get(&key, self.clock.now()) {
            return Ok(LoadedActivities {
                from_cache: true,
                ..hit
            });
        }

        let _guard = self.load_lock.lock().await;

        // Another request may have loaded while we waited for the lock.
        if !refresh {
            if let Some(hit) = self.cache.get(&key, self.clock.now()) {
                return Ok(LoadedActivities {
                    from_cache: true,
                    ..hit
                });
            }
        }

        let loaded = self.run_pipeline().await?;
        if loaded.status == FetchStatus::Success {
            self.cache.insert(key, loaded.clone(), loaded.fetched_at);
        }
        Ok(loaded)
    }

    async fn run_pipeline(&self) -> Result<LoadedActivities> {
        let now = self.clock.now();
        let cutoff = history_cutoff(now, self.params.history_window_days)?;

        let access_token = self.tokens.get_valid_access_token().await?;
        let outcome = self
            .fetcher
            .fetch(&access_token, cutoff.timestamp(), self.params)
            .await;

        if let Some(error) = &outcome.error {
            if error.kind == FetchErrorKind::Unauthorized {
                self.tokens.invalidate_access_token().await;
            }
        }

        let normalized = normalize_activities(
            &outcome.activities,
            Some(cutoff.with_timezone(&self.clock.utc_offset()).naive_local()),
            &self.buckets,
        );
        let skipped_records = outcome.skipped.len() + normalized.skipped.len();

        let status = match outcome.error {
            Some(error) if outcome.pages_fetched == 0 => return Err(AppError::Fetch(error)),
            Some(error) => FetchStatus::Partial {
                failed_page: error.page,
                message: error.to_string(),
                remedy: error.remedy(),
            },
            None => FetchStatus::Success,
        };

        tracing::info!(
            rows = normalized.rows.len(),
            skipped = skipped_records,
            outside_window = normalized.outside_window,
            status = ?status,
            "Dashboard data loaded"
        );

        Ok(LoadedActivities {
            rows: Arc::new(normalized.rows),
            status,
            skipped_records,
            fetched_at: now,
            from_cache: false,
        })
    }
}

/// Oldest start time kept: `now` minus the history window.
fn history_cutoff(now: DateTime<Utc>, window_days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(window_days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "history window of {} days is out of range",
                window_days
            ))
        })
}

// ─── Dashboard View ──────────────────────────────────────────

/// Units for pace values in the pace series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PaceUnit {
    #[default]
    #[serde(rename = "min/km")]
    MinPerKm,
    #[serde(rename = "s/km")]
    SecPerKm,
}

impl std::str::FromStr for PaceUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min/km" | "min" | "min_per_km" => Ok(PaceUnit::MinPerKm),
            "s/km" | "s" | "sec" | "s_per_km" => Ok(PaceUnit::SecPerKm),
            other => Err(format!("unknown pace unit {:?}: expected min/km or s/km", other)),
        }
    }
}

/// One point of the pace-over-time and pace-vs-distance charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PacePoint {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub date: NaiveDate,
    pub name: String,
    pub sport_type: String,
    pub distance_km: f64,
    /// In the requested unit
    pub pace: f64,
    pub distance_bucket: String,
}

/// First and last activity dates, for the date range control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

/// Per-request view options.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub filter: RowFilter,
    pub period: Period,
    /// Inclusive km range for pace points
    pub min_km: Option<f64>,
    pub max_km: Option<f64>,
    pub pace_unit: PaceUnit,
}

impl ViewOptions {
    pub fn new(filter: RowFilter) -> Self {
        Self {
            filter,
            period: Period::default(),
            min_km: None,
            max_km: None,
            pace_unit: PaceUnit::default(),
        }
    }
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardView {
    pub kpis: KpiSet,
    pub period: Period,
    pub aggregates: Vec<AggregateBucket>,
    pub pace_unit: PaceUnit,
    pub pace_points: Vec<PacePoint>,
    /// Filtered table rows, in source order
    pub activities: Vec<ActivityRow>,
    /// Sports present before filtering
    pub sport_types: Vec<String>,
    /// Dates present before filtering
    pub date_span: Option<DateSpan>,
}

/// Build the dashboard for already-loaded rows.
///
/// KPIs, aggregates, pace points and the table all use the same filtered
/// row-set.
pub fn build_dashboard(rows: &[ActivityRow], options: &ViewOptions, today: NaiveDate) -> DashboardView {
    let filtered = options.filter.apply(rows);

    let mut sport_types: Vec<String> = rows.iter().map(|r| r.sport_type.clone()).collect();
    sport_types.sort();
    sport_types.dedup();

    let date_span = rows
        .iter()
        .map(|r| r.date)
        .min()
        .zip(rows.iter().map(|r| r.date).max())
        .map(|(first, last)| DateSpan { first, last });

    DashboardView {
        kpis: compute_kpis(filtered.iter().copied(), today),
        period: options.period,
        aggregates: aggregate_by_period(filtered.iter().copied(), options.period),
        pace_unit: options.pace_unit,
        pace_points: pace_points(&filtered, options),
        activities: filtered.iter().map(|r| (*r).clone()).collect(),
        sport_types,
        date_span,
    }
}

fn pace_points(rows: &[&ActivityRow], options: &ViewOptions) -> Vec<PacePoint> {
    rows.iter()
        .filter(|r| options.min_km.map_or(true, |min| r.distance_km >= min))
        .filter(|r| options.max_km.map_or(true, |max| r.distance_km <= max))
        .filter_map(|r| {
            let pace = match options.pace_unit {
                PaceUnit::MinPerKm => r.pace_min_per_km()?,
                PaceUnit::SecPerKm => r.pace_s_per_km?,
            };
            Some(PacePoint {
                id: r.id,
                date: r.date,
                name: r.name.clone(),
                sport_type: r.sport_type.clone(),
                distance_km: r.distance_km,
                pace,
                distance_bucket: r.distance_bucket.clone(),
            })
        })
        .collect()
}
