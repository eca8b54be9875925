// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard API routes.

use crate::error::{AppError, Result};
use crate::models::{ActivityRow, AggregateBucket, KpiSet, Period};
use crate::services::dashboard::{
    build_dashboard, DashboardView, FetchStatus, LoadedActivities, PaceUnit, ViewOptions,
};
use crate::services::kpi::compute_kpis;
use crate::services::transform::{aggregate_filtered, RowFilter, SportFilter};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Dashboard API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/activities", get(get_activities))
        .route("/api/aggregates", get(get_aggregates))
        .route("/api/kpis", get(get_kpis))
        .route("/api/refresh", post(refresh))
}

// ─── Load Status ─────────────────────────────────────────────

/// How the rows behind a response were obtained.
#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoadStatus {
    pub fetch: FetchStatus,
    pub row_count: usize,
    /// Malformed activities that were skipped
    pub skipped_records: usize,
    pub fetched_at: String,
    pub from_cache: bool,
}

impl From<&LoadedActivities> for LoadStatus {
    fn from(loaded: &LoadedActivities) -> Self {
        Self {
            fetch: loaded.status.clone(),
            row_count: loaded.rows.len(),
            skipped_records: loaded.skipped_records,
            fetched_at: format_utc_rfc3339(loaded.fetched_at),
            from_cache: loaded.from_cache,
        }
    }
}

// ─── Query Parsing ───────────────────────────────────────────

/// Filter parameters shared by every data endpoint.
#[derive(Deserialize, Debug, Default)]
struct FilterQuery {
    /// Sport type, or "all"; defaults to the configured sport
    sport: Option<String>,
    /// Inclusive start date (YYYY-MM-DD)
    start: Option<String>,
    /// Inclusive end date (YYYY-MM-DD)
    end: Option<String>,
}

impl FilterQuery {
    fn to_filter(&self, default_sport: &SportFilter) -> Result<RowFilter> {
        let sport = match self.sport.as_deref() {
            Some(raw) => SportFilter::parse(raw),
            None => default_sport.clone(),
        };
        let start = parse_date("start", self.start.as_deref())?;
        let end = parse_date("end", self.end.as_deref())?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::BadRequest(format!(
                    "'start' ({}) is after 'end' ({})",
                    start, end
                )));
            }
        }

        Ok(RowFilter { sport, start, end })
    }
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                AppError::BadRequest(format!("Invalid '{}' parameter: expected YYYY-MM-DD", name))
            })
        })
        .transpose()
}

fn parse_period(raw: Option<&str>) -> Result<Period> {
    raw.map(|s| s.parse::<Period>().map_err(AppError::BadRequest))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_km(name: &str, raw: Option<&str>) -> Result<Option<f64>> {
    let invalid = || {
        AppError::BadRequest(format!(
            "Invalid '{}' parameter: must be a non-negative number",
            name
        ))
    };
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => {
            let km = s.parse::<f64>().map_err(|_| invalid())?;
            if km.is_finite() && km >= 0.0 {
                Ok(Some(km))
            } else {
                Err(invalid())
            }
        }
    }
}

// ─── Dashboard ───────────────────────────────────────────────

/// Flattened query structs must hold only strings; numbers are parsed by hand.
#[derive(Deserialize, Debug, Default)]
struct DashboardQuery {
    #[serde(flatten)]
    filter: FilterQuery,
    period: Option<String>,
    min_km: Option<String>,
    max_km: Option<String>,
    pace_unit: Option<String>,
}

impl DashboardQuery {
    fn to_options(&self, default_sport: &SportFilter) -> Result<ViewOptions> {
        let mut options = ViewOptions::new(self.filter.to_filter(default_sport)?);
        options.period = parse_period(self.period.as_deref())?;
        options.min_km = parse_km("min_km", self.min_km.as_deref())?;
        options.max_km = parse_km("max_km", self.max_km.as_deref())?;
        if let (Some(min), Some(max)) = (options.min_km, options.max_km) {
            if min > max {
                return Err(AppError::BadRequest(
                    "'min_km' must not exceed 'max_km'".to_string(),
                ));
            }
        }
        if let Some(unit) = self.pace_unit.as_deref() {
            options.pace_unit = unit.parse::<PaceUnit>().map_err(AppError::BadRequest)?;
        }
        Ok(options)
    }
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardResponse {
    pub status: LoadStatus,
    pub bucket_labels: Vec<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub view: DashboardView,
}

/// Full dashboard payload for one filter selection.
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>> {
    let options = params.to_options(state.dashboard.default_sport())?;
    tracing::debug!(
        filter = ?options.filter,
        period = ?options.period,
        "Building dashboard"
    );

    let loaded = state.dashboard.load(false).await?;
    let view = build_dashboard(&loaded.rows, &options, state.dashboard.today());

    Ok(Json(DashboardResponse {
        status: LoadStatus::from(&loaded),
        bucket_labels: state.dashboard.bucket_labels().to_vec(),
        view,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub status: LoadStatus,
    pub activities: Vec<ActivityRow>,
}

/// Filtered activity table.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<ActivitiesResponse>> {
    let filter = params.to_filter(state.dashboard.default_sport())?;
    let loaded = state.dashboard.load(false).await?;

    let activities = filter.apply(&loaded.rows).into_iter().cloned().collect();

    Ok(Json(ActivitiesResponse {
        status: LoadStatus::from(&loaded),
        activities,
    }))
}

// ─── Aggregates ──────────────────────────────────────────────

#[derive(Deserialize, Debug, Default)]
struct AggregatesQuery {
    #[serde(flatten)]
    filter: FilterQuery,
    period: Option<String>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AggregatesResponse {
    pub status: LoadStatus,
    pub period: Period,
    pub buckets: Vec<AggregateBucket>,
}

/// Per-period totals.
async fn get_aggregates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregatesQuery>,
) -> Result<Json<AggregatesResponse>> {
    let filter = params.filter.to_filter(state.dashboard.default_sport())?;
    let period = parse_period(params.period.as_deref())?;
    let loaded = state.dashboard.load(false).await?;

    Ok(Json(AggregatesResponse {
        status: LoadStatus::from(&loaded),
        period,
        buckets: aggregate_filtered(&loaded.rows, period, &filter),
    }))
}

// ─── KPIs ────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct KpisResponse {
    pub status: LoadStatus,
    pub today: NaiveDate,
    pub kpis: KpiSet,
}

/// Week/month/year-to-date totals.
async fn get_kpis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<KpisResponse>> {
    let filter = params.to_filter(state.dashboard.default_sport())?;
    let loaded = state.dashboard.load(false).await?;
    let today = state.dashboard.today();

    Ok(Json(KpisResponse {
        status: LoadStatus::from(&loaded),
        today,
        kpis: compute_kpis(filter.apply(&loaded.rows), today),
    }))
}

// ─── Refresh ─────────────────────────────────────────────────

/// Drop cached rows and run a fetch cycle now.
async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<LoadStatus>> {
    tracing::info!("Manual refresh requested");
    let loaded = state.dashboard.load(true).await?;
    Ok(Json(LoadStatus::from(&loaded)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_defaults_to_configured_sport() {
        let query = FilterQuery::default();
        let filter = query
            .to_filter(&SportFilter::Only("Run".to_string()))
            .unwrap();
        assert_eq!(filter.sport, SportFilter::Only("Run".to_string()));
        assert_eq!(filter.start, None);
    }

    #[test]
    fn test_filter_query_all_sports() {
        let query = FilterQuery {
            sport: Some("All".to_string()),
            ..Default::default()
        };
        let filter = query
            .to_filter(&SportFilter::Only("Run".to_string()))
            .unwrap();
        assert_eq!(filter.sport, SportFilter::All);
    }

    #[test]
    fn test_filter_query_rejects_bad_dates() {
        let query = FilterQuery {
            start: Some("2024-13-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.to_filter(&SportFilter::All),
            Err(AppError::BadRequest(_))
        ));

        let reversed = FilterQuery {
            start: Some("2024-03-10".to_string()),
            end: Some("2024-03-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            reversed.to_filter(&SportFilter::All),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_dashboard_query_validation() {
        let bad_range = DashboardQuery {
            min_km: Some("10".to_string()),
            max_km: Some("5".to_string()),
            ..Default::default()
        };
        assert!(bad_range.to_options(&SportFilter::All).is_err());

        let negative = DashboardQuery {
            min_km: Some("-1".to_string()),
            ..Default::default()
        };
        assert!(negative.to_options(&SportFilter::All).is_err());

        let bad_period = DashboardQuery {
            period: Some("fortnight".to_string()),
            ..Default::default()
        };
        assert!(bad_period.to_options(&SportFilter::All).is_err());

        let ok = DashboardQuery {
            period: Some("month".to_string()),
            pace_unit: Some("s/km".to_string()),
            ..Default::default()
        };
        let options = ok.to_options(&SportFilter::All).unwrap();
        assert_eq!(options.period, Period::Month);
        assert_eq!(options.pace_unit, PaceUnit::SecPerKm);
    }
}
