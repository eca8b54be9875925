// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use strava_dashboard::config::Config;
use strava_dashboard::routes::create_router;
use strava_dashboard::services::DashboardService;
use strava_dashboard::time_utils::ManualClock;
use strava_dashboard::AppState;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const ACTIVITIES_PATH: &str = "/api/v3/athlete/activities";
#[allow(dead_code)]
pub const ATHLETE_PATH: &str = "/api/v3/athlete";
#[allow(dead_code)]
pub const TOKEN_PATH: &str = "/oauth/token";

/// Fixed "now" for tests: Thursday 2024-03-14, noon UTC.
#[allow(dead_code)]
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(test_now()))
}

/// Test config pointing at the mock Strava server.
#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> Config {
    Config {
        strava_api_base_url: format!("{}/api/v3", server.uri()),
        strava_token_url: format!("{}{}", server.uri(), TOKEN_PATH),
        page_size: 2,
        ..Config::test_default()
    }
}

/// Strava-shaped activity summary.
#[allow(dead_code)]
pub fn activity(id: u64, sport: &str, start_local: &str, meters: f64, moving_s: u64) -> Value {
    let average_speed = if moving_s > 0 {
        meters / moving_s as f64
    } else {
        0.0
    };
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "sport_type": sport,
        "type": sport,
        "start_date": start_local,
        "start_date_local": start_local,
        "distance": meters,
        "moving_time": moving_s,
        "elapsed_time": moving_s + 60,
        "average_speed": average_speed,
    })
}

/// Token endpoint answering with a fresh access token valid for six hours.
#[allow(dead_code)]
pub async fn mount_token_refresh(server: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": access_token,
            "refresh_token": "test_refresh_token",
            "expires_at": (test_now() + chrono::Duration::hours(6)).timestamp(),
            "expires_in": 21600,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// One activities page.
#[allow(dead_code)]
pub async fn mount_page(server: &MockServer, page: u32, body: Vec<Value>, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(ACTIVITIES_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(body)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// One activities page that fails with the given status and Strava error body.
#[allow(dead_code)]
pub async fn mount_page_error(server: &MockServer, page: u32, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(ACTIVITIES_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn authorization_error(field: &str) -> Value {
    json!({
        "message": "Authorization Error",
        "errors": [{ "resource": "AccessToken", "field": field, "code": "invalid" }]
    })
}

/// Create a test app against a mock Strava server.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config, clock: Arc<ManualClock>) -> (axum::Router, Arc<AppState>) {
    let dashboard = DashboardService::new(&config, clock).expect("valid test config");
    let state = Arc::new(AppState { config, dashboard });
    (create_router(state.clone()), state)
}
