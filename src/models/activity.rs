// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity records: the raw API shape and the normalized row.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::stats::{IsoWeekId, MonthId, Period, PeriodKey};

/// One activity as returned by `GET /athlete/activities`.
///
/// Every field is optional so a single bad record cannot fail a whole page;
/// presence of the required ones is checked during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawActivity {
    pub id: Option<u64>,
    pub name: Option<String>,
    /// Fine-grained sport (e.g. "TrailRun")
    pub sport_type: Option<String>,
    /// Legacy coarse type, used when `sport_type` is absent
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    /// Start time in the athlete's local timezone (ISO 8601)
    pub start_date_local: Option<String>,
    /// Start time in UTC (ISO 8601)
    pub start_date: Option<String>,
    /// Distance in meters
    pub distance: Option<f64>,
    /// Moving time in seconds
    pub moving_time: Option<u64>,
    /// Elapsed time in seconds
    pub elapsed_time: Option<u64>,
    /// Meters per second
    pub average_speed: Option<f64>,
}

impl RawActivity {
    /// Sport name, preferring `sport_type` over the legacy `type`.
    pub fn sport(&self) -> Option<&str> {
        self.sport_type
            .as_deref()
            .or(self.activity_type.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Normalized, analysis-ready projection of exactly one [`RawActivity`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityRow {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    /// Local start time, taken as-is from `start_date_local`
    pub start_local: NaiveDateTime,
    pub date: NaiveDate,
    pub year: i32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub month: MonthId,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub week: IsoWeekId,
    pub distance_km: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub moving_time_s: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub elapsed_time_s: Option<u64>,
    pub average_speed_mps: Option<f64>,
    /// Seconds per km; `None` when distance is zero
    pub pace_s_per_km: Option<f64>,
    pub distance_bucket: String,
}

impl ActivityRow {
    pub fn pace_min_per_km(&self) -> Option<f64> {
        self.pace_s_per_km.map(|p| p / 60.0)
    }

    /// Grouping key of this row for the given granularity.
    pub fn period_key(&self, period: Period) -> PeriodKey {
        match period {
            Period::Year => PeriodKey::Year(self.year),
            Period::Month => PeriodKey::Month(self.month),
            Period::Week => PeriodKey::Week(self.week),
        }
    }
}

/// Parse a Strava local timestamp without any timezone conversion.
///
/// Strava suffixes local times with `Z` even though they are not UTC, so the
/// written wall-clock time is kept whatever offset is present.
pub fn parse_local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
