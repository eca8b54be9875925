//! Aggregation keys, per-period buckets and KPI values served to the dashboard.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Week,
    Month,
    Year,
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(format!(
                "unknown period {:?}: expected week, month or year",
                other
            )),
        }
    }
}

/// Calendar month, displayed as "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthId {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// ISO 8601 week, displayed as "YYYY-Www".
///
/// `year` is the ISO week-numbering year, which differs from the calendar
/// year for a few days around New Year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeekId {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for IsoWeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

/// Identifier of one aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Year(i32),
    Month(MonthId),
    Week(IsoWeekId),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Year(y) => write!(f, "{:04}", y),
            PeriodKey::Month(m) => m.fmt(f),
            PeriodKey::Week(w) => w.fmt(f),
        }
    }
}

macro_rules! serialize_as_display {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }
        )*
    };
}

serialize_as_display!(MonthId, IsoWeekId, PeriodKey);

/// Totals for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AggregateBucket {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub period_key: PeriodKey,
    pub total_distance_km: f64,
    pub activity_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_time_s: u64,
    /// Mean of the defined paces in this period
    pub avg_pace_s_per_km: Option<f64>,
}

/// Headline numbers for the calendar windows containing "today".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct KpiSet {
    pub week_distance_km: f64,
    pub month_distance_km: f64,
    pub year_distance_km: f64,
    pub week_count: u32,
    pub month_count: u32,
    pub year_count: u32,
    /// All activities in the filtered row-set
    pub total_activities: u32,
}
