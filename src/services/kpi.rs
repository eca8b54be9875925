// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! KPI calculation over calendar-aligned windows.
//!
//! Each window runs from the start of the calendar period containing `today`
//! (ISO week Monday, first of month, January 1st) through `today` inclusive.

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{ActivityRow, KpiSet};
use crate::services::transform::order_independent_sum;

/// First day of the ISO week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

pub fn year_start(day: NaiveDate) -> NaiveDate {
    day.with_ordinal(1).unwrap_or(day)
}

#[derive(Default)]
struct Window {
    distances_km: Vec<f64>,
    count: u32,
}

impl Window {
    fn add(&mut self, row: &ActivityRow) {
        self.distances_km.push(row.distance_km);
        self.count += 1;
    }

    fn total_km(self) -> f64 {
        order_independent_sum(self.distances_km)
    }
}

/// Compute week/month/year-to-date totals for an already-filtered row-set.
pub fn compute_kpis<'a, I>(rows: I, today: NaiveDate) -> KpiSet
where
    I: IntoIterator<Item = &'a ActivityRow>,
{
    let week_from = week_start(today);
    let month_from = month_start(today);
    let year_from = year_start(today);

    let mut week = Window::default();
    let mut month = Window::default();
    let mut year = Window::default();
    let mut total_activities = 0;

    for row in rows {
        total_activities += 1;
        if row.date > today {
            continue;
        }
        if row.date >= week_from {
            week.add(row);
        }
        if row.date >= month_from {
            month.add(row);
        }
        if row.date >= year_from {
            year.add(row);
        }
    }

    KpiSet {
        week_count: week.count,
        month_count: month.count,
        year_count: year.count,
        week_distance_km: week.total_km(),
        month_distance_km: month.total_km(),
        year_distance_km: year.total_km(),
        total_activities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawActivity;
    use crate::services::transform::{normalize_activities, DistanceBuckets};

    fn rows(entries: &[(&str, f64)]) -> Vec<ActivityRow> {
        let raws: Vec<RawActivity> = entries
            .iter()
            .enumerate()
            .map(|(i, (date, meters))| RawActivity {
                id: Some(i as u64 + 1),
                sport_type: Some("Run".to_string()),
                start_date_local: Some(format!("{}T07:00:00Z", date)),
                distance: Some(*meters),
                moving_time: Some(1800),
                ..Default::default()
            })
            .collect();
        normalize_activities(&raws, None, &DistanceBuckets::default()).rows
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_starts() {
        // Thursday
        let today = day(2024, 3, 14);
        assert_eq!(week_start(today), day(2024, 3, 11));
        assert_eq!(month_start(today), day(2024, 3, 1));
        assert_eq!(year_start(today), day(2024, 1, 1));

        // Monday is its own week start
        assert_eq!(week_start(day(2024, 3, 11)), day(2024, 3, 11));
    }

    #[test]
    fn test_calendar_aligned_windows() {
        let rows = rows(&[
            ("2024-03-14", 5000.0),  // this week
            ("2024-03-11", 10000.0), // this week (Monday)
            ("2024-03-10", 8000.0),  // last week, this month
            ("2024-02-29", 21000.0), // this year
            ("2023-12-31", 42200.0), // last year
        ]);

        let kpis = compute_kpis(&rows, day(2024, 3, 14));

        assert_eq!(kpis.week_distance_km, 15.0);
        assert_eq!(kpis.week_count, 2);
        assert_eq!(kpis.month_distance_km, 23.0);
        assert_eq!(kpis.month_count, 3);
        assert_eq!(kpis.year_distance_km, 44.0);
        assert_eq!(kpis.year_count, 4);
        assert_eq!(kpis.total_activities, 5);
    }

    #[test]
    fn test_not_rolling_windows() {
        // Six days ago is inside a rolling 7-day window but in the previous
        // calendar week when today is a Tuesday.
        let rows = rows(&[("2024-03-06", 5000.0)]);
        let kpis = compute_kpis(&rows, day(2024, 3, 12));
        assert_eq!(kpis.week_count, 0);
        assert_eq!(kpis.month_count, 1);
    }

    #[test]
    fn test_future_rows_excluded_from_windows() {
        let rows = rows(&[("2024-03-15", 5000.0)]);
        let kpis = compute_kpis(&rows, day(2024, 3, 14));
        assert_eq!(kpis.week_count, 0);
        assert_eq!(kpis.total_activities, 1);
    }

    #[test]
    fn test_empty_rows() {
        let rows: Vec<ActivityRow> = Vec::new();
        let kpis = compute_kpis(&rows, day(2024, 3, 14));
        assert_eq!(kpis, KpiSet::default());
    }

    #[test]
    fn test_pure_function_of_inputs() {
        let rows = rows(&[("2024-03-14", 1234.5), ("2024-03-01", 987.6)]);
        let today = day(2024, 3, 14);
        assert_eq!(compute_kpis(&rows, today), compute_kpis(&rows, today));
    }
}
