mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, token_expiring_in};
use efarmer_auth::store::{ACCESS_TOKEN, LAST_ACTIVITY, REFRESH_TOKEN};
use efarmer_auth::{
    AuthError, HttpTokenRefresher, KeyValueStore, RefreshError, RefreshState, SessionManager,
    SessionOptions, TokenRefresher,
};
use futures_util::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer, env: efarmer_auth::Environment) -> Arc<SessionManager> {
    let api_url = format!("{}/api", server.uri());
    let refresher = Arc::new(HttpTokenRefresher::new(&api_url, reqwest::Client::new()));
    Arc::new(SessionManager::new(env, refresher, SessionOptions::default()))
}

#[tokio::test]
async fn test_http_refresher_returns_access_and_rotated_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "old-refresh"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "new-access",
            "refresh": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = HttpTokenRefresher::new(&format!("{}/api/", server.uri()), reqwest::Client::new());
    assert!(refresher.url().ends_with("/api/token/refresh/"));

    let tokens = refresher.refresh("old-refresh").await.unwrap();
    assert_eq!(tokens.access, "new-access");
    assert_eq!(tokens.refresh.as_deref(), Some("new-refresh"));
}

#[tokio::test]
async fn test_http_refresher_requires_access_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "ok"})))
        .mount(&server)
        .await;

    let refresher = HttpTokenRefresher::new(&format!("{}/api", server.uri()), reqwest::Client::new());
    let result = refresher.refresh("any").await;
    assert_eq!(result, Err(RefreshError::MissingAccessToken));
}

#[tokio::test]
async fn test_http_refresher_surfaces_detail_on_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token is invalid or expired",
            "code": "token_not_valid"
        })))
        .mount(&server)
        .await;

    let refresher = HttpTokenRefresher::new(&format!("{}/api", server.uri()), reqwest::Client::new());
    let result = refresher.refresh("stale").await;
    assert_eq!(
        result,
        Err(RefreshError::Rejected {
            status: 401,
            detail: "Token is invalid or expired".to_string(),
        })
    );
}

#[tokio::test]
async fn test_fresh_token_is_used_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness("/dashboard");
    let session = session_for(&server, h.env.clone());
    let access = token_expiring_in(3600, "7");
    session.establish(&access, "refresh-7");
    h.store.remove(LAST_ACTIVITY).unwrap();

    let token = session.authorize_request().await.unwrap();

    assert_eq!(token, access);
    assert!(session.last_activity().is_some());
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_expired_token_triggers_single_refresh() {
    let server = MockServer::start().await;
    let refreshed = token_expiring_in(3600, "7");

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "refresh-7"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": refreshed}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness("/orders");
    let session = session_for(&server, h.env.clone());
    session.establish(&token_expiring_in(60, "7"), "refresh-7");

    let results = join_all((0..6).map(|_| {
        let session = session.clone();
        async move { session.authorize_request().await }
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap(), refreshed);
    }
    assert_eq!(session.access_token().as_deref(), Some(refreshed.as_str()));
    assert_eq!(session.default_bearer().as_deref(), Some(refreshed.as_str()));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-7"));
    assert_eq!(session.coordinator().state(), RefreshState::Idle);
    assert!(h.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_refresh_failure_rejects_all_and_tears_down_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Token is blacklisted"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness("/cart");
    let session = session_for(&server, h.env.clone());
    session.establish(&token_expiring_in(-30, "7"), "refresh-7");
    session.store().set_item("user", &json!({"id": 7}));

    let results = join_all((0..4).map(|_| {
        let session = session.clone();
        async move { session.authorize_request().await }
    }))
    .await;

    for result in results {
        match result {
            Err(AuthError::Refresh(RefreshError::Rejected { status, detail })) => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Token is blacklisted");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    assert!(session.snapshot().is_empty());
    assert!(h.store.is_empty());
    assert_eq!(session.default_bearer(), None);
    assert_eq!(h.navigator.redirects(), vec!["/login".to_string()]);
    assert_eq!(
        h.notifier.errors(),
        vec!["Session expired. Please log in again.".to_string()]
    );
}

#[tokio::test]
async fn test_missing_tokens_abort_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness("/profile");
    let session = session_for(&server, h.env.clone());
    session.store().set_item(ACCESS_TOKEN, &token_expiring_in(3600, "7"));

    let result = session.authorize_request().await;

    assert!(matches!(result, Err(AuthError::MissingTokens)));
    assert_eq!(session.access_token(), None);
    assert_eq!(h.navigator.redirects(), vec!["/login".to_string()]);
    assert_eq!(h.notifier.errors(), vec!["Please log in to continue".to_string()]);
}

#[tokio::test]
async fn test_teardown_on_login_page_stays_quiet() {
    let server = MockServer::start().await;
    let h = harness("/login");
    let session = session_for(&server, h.env.clone());
    session.establish("a", "b");

    session.teardown("Your session has expired. Please log in again.");
    session.teardown("Your session has expired. Please log in again.");

    assert!(session.snapshot().is_empty());
    assert!(h.navigator.redirects().is_empty());
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn test_logout_clears_and_redirects() {
    let server = MockServer::start().await;
    let h = harness("/farmer/products");
    let session = session_for(&server, h.env.clone());
    session.establish(&token_expiring_in(3600, "7"), "refresh-7");

    session.logout();

    assert!(session.snapshot().is_empty());
    assert_eq!(session.default_bearer(), None);
    assert!(!session.is_authenticated());
    assert_eq!(h.navigator.redirects(), vec!["/login".to_string()]);
    assert_eq!(
        h.notifier.all(),
        vec![("info", "You have been logged out.".to_string())]
    );
}

#[tokio::test]
async fn test_persisted_session_restores_default_bearer() {
    let server = MockServer::start().await;
    let h = harness("/");
    h.store
        .set(ACCESS_TOKEN, serde_json::to_string("persisted").unwrap())
        .unwrap();
    h.store
        .set(REFRESH_TOKEN, serde_json::to_string("r").unwrap())
        .unwrap();

    let session = session_for(&server, h.env.clone());
    assert_eq!(session.default_bearer().as_deref(), Some("persisted"));
}
