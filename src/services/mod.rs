// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod cache;
pub mod dashboard;
pub mod fetcher;
pub mod kpi;
pub mod strava;
pub mod transform;

pub use cache::ResultCache;
pub use dashboard::{
    build_dashboard, DashboardService, DashboardView, FetchStatus, LoadedActivities, PaceUnit,
    ViewOptions,
};
pub use fetcher::{ActivityFetcher, FetchOutcome, FetchParams};
pub use kpi::compute_kpis;
pub use strava::{StravaClient, TokenManager};
pub use transform::{
    aggregate_by_period, normalize_activities, DistanceBuckets, RowFilter, SportFilter,
};
