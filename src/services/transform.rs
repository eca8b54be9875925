// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization of raw Strava activities into rows, and per-period aggregation.
//!
//! Everything here is a pure function of its inputs: the same raw activities
//! always yield the same rows and buckets, whatever order they arrive in.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::error::DataError;
use crate::models::activity::parse_local_timestamp;
use crate::models::{ActivityRow, AggregateBucket, IsoWeekId, MonthId, Period, PeriodKey, RawActivity};

// ─── Distance Buckets ────────────────────────────────────────

/// Distance categories defined by increasing km edges.
///
/// Edges `[5, 10]` give `<5K`, `5-10K`, `10K+`; every non-negative distance
/// falls in exactly one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBuckets {
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl DistanceBuckets {
    pub fn new(edges: Vec<f64>) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            var: "DISTANCE_BUCKET_EDGES",
            reason: reason.to_string(),
        };

        if edges.is_empty() {
            return Err(invalid("at least one edge is required"));
        }
        if edges.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(invalid("edges must be positive finite numbers"));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("edges must be strictly increasing"));
        }

        let mut labels = Vec::with_capacity(edges.len() + 1);
        labels.push(format!("<{}K", edges[0]));
        for w in edges.windows(2) {
            labels.push(format!("{}-{}K", w[0], w[1]));
        }
        labels.push(format!("{}K+", edges[edges.len() - 1]));

        Ok(Self { edges, labels })
    }

    /// Label of the bucket containing `distance_km` (lower edge inclusive).
    pub fn label_for(&self, distance_km: f64) -> &str {
        let idx = self.edges.partition_point(|edge| *edge <= distance_km);
        &self.labels[idx]
    }

    /// All labels, shortest distances first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for DistanceBuckets {
    fn default() -> Self {
        Self {
            edges: vec![5.0, 10.0, 15.0, 20.0],
            labels: ["<5K", "5-10K", "10-15K", "15-20K", "20K+"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ─── Normalization ───────────────────────────────────────────

/// Rows built from a batch of raw activities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    /// Rows in input order
    pub rows: Vec<ActivityRow>,
    /// Records dropped for missing or invalid required fields
    pub skipped: Vec<DataError>,
    /// Records older than the history window
    pub outside_window: usize,
}

/// Turn raw activities into rows.
///
/// Records starting before `cutoff` are dropped before any row is built.
/// Malformed records are skipped and reported in `skipped`.
pub fn normalize_activities(
    raw: &[RawActivity],
    cutoff: Option<NaiveDateTime>,
    buckets: &DistanceBuckets,
) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for activity in raw {
        let start_local = match start_time(activity) {
            Ok(start) => start,
            Err(e) => {
                outcome.skipped.push(e);
                continue;
            }
        };

        if cutoff.is_some_and(|c| start_local < c) {
            outcome.outside_window += 1;
            continue;
        }

        match build_row(activity, start_local, buckets) {
            Ok(row) => outcome.rows.push(row),
            Err(e) => outcome.skipped.push(e),
        }
    }

    if !outcome.skipped.is_empty() {
        tracing::warn!(
            skipped = outcome.skipped.len(),
            first = %outcome.skipped[0],
            "Skipped malformed activities"
        );
    }
    tracing::debug!(
        rows = outcome.rows.len(),
        outside_window = outcome.outside_window,
        "Normalized activities"
    );

    outcome
}

/// Normalize a single activity with no history window.
pub fn normalize_activity(
    activity: &RawActivity,
    buckets: &DistanceBuckets,
) -> Result<ActivityRow, DataError> {
    let start_local = start_time(activity)?;
    build_row(activity, start_local, buckets)
}

fn start_time(activity: &RawActivity) -> Result<NaiveDateTime, DataError> {
    let raw = activity
        .start_date_local
        .as_deref()
        .or(activity.start_date.as_deref())
        .ok_or_else(|| DataError::new(activity.id, "missing start_date_local"))?;

    parse_local_timestamp(raw)
        .ok_or_else(|| DataError::new(activity.id, format!("unparseable start date {:?}", raw)))
}

fn build_row(
    activity: &RawActivity,
    start_local: NaiveDateTime,
    buckets: &DistanceBuckets,
) -> Result<ActivityRow, DataError> {
    let id = activity
        .id
        .ok_or_else(|| DataError::new(None, "missing id"))?;
    let sport_type = activity
        .sport()
        .ok_or_else(|| DataError::new(Some(id), "missing sport_type"))?
        .to_string();
    let distance_m = activity
        .distance
        .ok_or_else(|| DataError::new(Some(id), "missing distance"))?;
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(DataError::new(
            Some(id),
            format!("invalid distance {}", distance_m),
        ));
    }
    let moving_time_s = activity
        .moving_time
        .ok_or_else(|| DataError::new(Some(id), "missing moving_time"))?;

    let date = start_local.date();
    let iso = date.iso_week();
    let distance_km = distance_m / 1000.0;
    let pace_s_per_km = (distance_km > 0.0).then(|| moving_time_s as f64 / distance_km);

    Ok(ActivityRow {
        id,
        name: activity.name.clone().unwrap_or_default(),
        sport_type,
        start_local,
        date,
        year: date.year(),
        month: MonthId {
            year: date.year(),
            month: date.month(),
        },
        week: IsoWeekId {
            year: iso.year(),
            week: iso.week(),
        },
        distance_km,
        moving_time_s,
        elapsed_time_s: activity.elapsed_time,
        average_speed_mps: activity.average_speed,
        pace_s_per_km,
        distance_bucket: buckets.label_for(distance_km).to_string(),
    })
}

// ─── Filtering ───────────────────────────────────────────────

/// Which sports to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SportFilter {
    All,
    Only(String),
}

impl SportFilter {
    /// "All" (any case) or an empty string disables filtering.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            SportFilter::All
        } else {
            SportFilter::Only(raw.to_string())
        }
    }

    pub fn matches(&self, sport_type: &str) -> bool {
        match self {
            SportFilter::All => true,
            SportFilter::Only(sport) => sport.eq_ignore_ascii_case(sport_type),
        }
    }
}

/// Filters applied before any aggregation or KPI computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub sport: SportFilter,
    /// Inclusive lower date bound
    pub start: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub end: Option<NaiveDate>,
}

impl RowFilter {
    pub fn sport(sport: SportFilter) -> Self {
        Self {
            sport,
            start: None,
            end: None,
        }
    }

    pub fn matches(&self, row: &ActivityRow) -> bool {
        self.sport.matches(&row.sport_type)
            && self.start.map_or(true, |s| row.date >= s)
            && self.end.map_or(true, |e| row.date <= e)
    }

    /// Matching rows, in their original order.
    pub fn apply<'a>(&self, rows: &'a [ActivityRow]) -> Vec<&'a ActivityRow> {
        rows.iter().filter(|r| self.matches(r)).collect()
    }
}

// ─── Aggregation ─────────────────────────────────────────────

#[derive(Default)]
struct BucketAccumulator {
    distances_km: Vec<f64>,
    paces: Vec<f64>,
    count: u32,
    time_s: u64,
}

/// Group rows by period; buckets are sorted by period key ascending.
///
/// Zero-distance rows count toward `activity_count` and `total_time_s` but
/// not toward the average pace.
pub fn aggregate_by_period<'a, I>(rows: I, period: Period) -> Vec<AggregateBucket>
where
    I: IntoIterator<Item = &'a ActivityRow>,
{
    let mut groups: BTreeMap<PeriodKey, BucketAccumulator> = BTreeMap::new();

    for row in rows {
        let acc = groups.entry(row.period_key(period)).or_default();
        acc.distances_km.push(row.distance_km);
        acc.count += 1;
        acc.time_s += row.moving_time_s;
        if let Some(pace) = row.pace_s_per_km {
            acc.paces.push(pace);
        }
    }

    groups
        .into_iter()
        .map(|(period_key, acc)| {
            let pace_count = acc.paces.len();
            AggregateBucket {
                period_key,
                total_distance_km: order_independent_sum(acc.distances_km),
                activity_count: acc.count,
                total_time_s: acc.time_s,
                avg_pace_s_per_km: (pace_count > 0)
                    .then(|| order_independent_sum(acc.paces) / pace_count as f64),
            }
        })
        .collect()
}

/// Filter, then group.
pub fn aggregate_filtered(
    rows: &[ActivityRow],
    period: Period,
    filter: &RowFilter,
) -> Vec<AggregateBucket> {
    aggregate_by_period(filter.apply(rows), period)
}

/// Float sum that does not depend on the order values were collected in.
pub(crate) fn order_independent_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}
