// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava Dashboard API Server
//!
//! Serves training aggregates and KPIs computed from the athlete's
//! Strava activity history.

use std::sync::Arc;
use strava_dashboard::{
    config::Config, services::DashboardService, time_utils::SystemClock, AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        history_window_days = config.history_window_days,
        max_pages = config.max_pages,
        page_size = config.page_size,
        "Starting Strava Dashboard API"
    );

    let dashboard = DashboardService::new(&config, Arc::new(SystemClock))?;
    tracing::info!(
        ttl_seconds = config.cache_ttl_seconds,
        buckets = ?dashboard.bucket_labels(),
        "Dashboard service initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        dashboard,
    });

    // Build router
    let app = strava_dashboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strava_dashboard=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
