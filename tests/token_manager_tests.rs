// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token lifecycle against a mock Strava token endpoint.

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use strava_dashboard::error::{AuthError, Remedy};
use strava_dashboard::models::Credential;
use strava_dashboard::services::{StravaClient, TokenManager};
use strava_dashboard::time_utils::ManualClock;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{test_clock, test_now, ATHLETE_PATH, TOKEN_PATH};

fn client(server: &MockServer) -> StravaClient {
    StravaClient::new(
        format!("{}/api/v3", server.uri()),
        format!("{}{}", server.uri(), TOKEN_PATH),
        StdDuration::from_secs(5),
    )
}

fn manager(
    server: &MockServer,
    refresh_token: Option<&str>,
    access_token: Option<&str>,
    clock: Arc<ManualClock>,
) -> TokenManager {
    let credential = Credential::new(
        "client".to_string(),
        "secret".to_string(),
        refresh_token.map(str::to_string),
        access_token.map(str::to_string),
    );
    TokenManager::new(client(server), credential, clock)
}

#[tokio::test]
async fn test_refresh_then_reuse_until_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_at": (test_now() + Duration::hours(6)).timestamp(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = test_clock();
    let tokens = manager(&server, Some("refresh-1"), None, clock.clone());

    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "access-1");

    // Still well inside the lifetime: no second exchange
    clock.advance(Duration::hours(5));
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "access-1");
}

#[tokio::test]
async fn test_refresh_inside_expiry_margin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_at": (test_now() + Duration::hours(1)).timestamp(),
        })))
        .expect(2)
        .mount(&server)
        .await;

    let clock = test_clock();
    let tokens = manager(&server, Some("refresh-1"), None, clock.clone());
    tokens.get_valid_access_token().await.unwrap();

    // Two minutes before expiry is within the refresh margin
    clock.advance(Duration::minutes(58));
    tokens.get_valid_access_token().await.unwrap();
}

#[tokio::test]
async fn test_rotated_refresh_token_is_used_next_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "rotated",
            "expires_at": (test_now() + Duration::hours(1)).timestamp(),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "rotated",
            "expires_at": (test_now() + Duration::hours(3)).timestamp(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = test_clock();
    let tokens = manager(&server, Some("original"), None, clock.clone());
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "access-1");

    clock.advance(Duration::hours(2));
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "access-2");
}

#[tokio::test]
async fn test_missing_scope_is_distinguished_from_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Authorization Error",
            "errors": [{
                "resource": "AccessToken",
                "field": "activity:read_permission",
                "code": "missing"
            }]
        })))
        .mount(&server)
        .await;

    let tokens = manager(&server, Some("refresh-1"), None, test_clock());
    let err = tokens.get_valid_access_token().await.unwrap_err();

    assert!(matches!(err, AuthError::InsufficientScope(_)), "{:?}", err);
    assert_eq!(err.remedy(), Remedy::Reauthorize);
}

#[tokio::test]
async fn test_invalid_client_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Bad Request",
            "errors": [{ "resource": "Application", "field": "client_id", "code": "invalid" }]
        })))
        .mount(&server)
        .await;

    let tokens = manager(&server, Some("refresh-1"), None, test_clock());
    let err = tokens.get_valid_access_token().await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(_)), "{:?}", err);
    assert_eq!(err.code(), "invalid_credentials");
}

#[tokio::test]
async fn test_revoked_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Bad Request",
            "errors": [{ "resource": "RefreshToken", "field": "refresh_token", "code": "invalid" }]
        })))
        .mount(&server)
        .await;

    let tokens = manager(&server, Some("revoked"), None, test_clock());
    let err = tokens.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredRefreshToken(_)), "{:?}", err);
}

#[tokio::test]
async fn test_token_endpoint_outage_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let tokens = manager(&server, Some("refresh-1"), None, test_clock());
    let err = tokens.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)), "{:?}", err);
    assert_eq!(err.remedy(), Remedy::Retry);
}

#[tokio::test]
async fn test_pre_issued_access_token_is_validated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ATHLETE_PATH))
        .and(header("authorization", "Bearer direct-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1234, "firstname": "Test", "lastname": "Athlete"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let tokens = manager(&server, None, Some("direct-token"), test_clock());
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "direct-token");
}

#[tokio::test]
async fn test_rejected_pre_issued_token_falls_back_to_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ATHLETE_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(common::authorization_error("access_token")),
        )
        .expect(1)
        .mount(&server)
        .await;
    common::mount_token_refresh(&server, "refreshed", 1).await;

    let tokens = manager(&server, Some("refresh-1"), Some("stale"), test_clock());
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "refreshed");

    // Now cached with a known expiry: no further validation or refresh
    assert_eq!(tokens.get_valid_access_token().await.unwrap(), "refreshed");
}

#[tokio::test]
async fn test_rejected_pre_issued_token_without_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ATHLETE_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(common::authorization_error("access_token")),
        )
        .mount(&server)
        .await;

    let tokens = manager(&server, None, Some("stale"), test_clock());
    let err = tokens.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)), "{:?}", err);
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let server = MockServer::start().await;
    common::mount_token_refresh(&server, "access-1", 2).await;

    let tokens = manager(&server, Some("refresh-1"), None, test_clock());
    tokens.get_valid_access_token().await.unwrap();
    tokens.invalidate_access_token().await;
    tokens.get_valid_access_token().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    common::mount_token_refresh(&server, "access-1", 1).await;

    let tokens = Arc::new(manager(&server, Some("refresh-1"), None, test_clock()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tokens = tokens.clone();
            tokio::spawn(async move { tokens.get_valid_access_token().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "access-1");
    }
}
