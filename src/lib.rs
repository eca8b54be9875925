// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava training dashboard.
//!
//! This crate provides the backend that fetches an athlete's Strava
//! activities, normalizes them, and serves period aggregates and KPIs
//! to the dashboard frontend.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::DashboardService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub dashboard: DashboardService,
}
