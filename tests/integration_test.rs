// Integration tests for YouTube Playlists
//
// These tests drive the full HTTP stack (routing, session middleware,
// OAuth flow, token persistence) against mocked Google endpoints.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mockito::Matcher;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

use yt_playlists::{
    auth::{load_client_secrets, AuthManager, CredentialSource, TokenStore, YOUTUBE_SCOPE},
    config::{Config, LogFormat},
    error::ApiError,
    http_client::YouTubeHttpClient,
    routes::{self, AppState},
    youtube::YouTubeApi,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

const REDIRECT_URI: &str = "http://127.0.0.1:3000/oauth2callback";

fn test_config(dir: &Path, api_url: &str) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        client_id: None,
        client_secret: None,
        client_secrets_file: dir.join("client_secret.json"),
        redirect_uri: REDIRECT_URI.to_string(),
        scopes: vec![YOUTUBE_SCOPE.to_string()],
        insecure_transport: true,
        token_file: dir.join("token.json"),
        session_secret: "integration-secret".to_string(),
        token_refresh_threshold: 300,
        youtube_api_url: api_url.to_string(),
        http_connect_timeout: 5,
        http_request_timeout: 5,
        http_max_retries: 0,
        log_level: "debug".to_string(),
        log_format: LogFormat::Text,
    }
}

/// Write a web client descriptor pointing at the mock token endpoint
fn write_client_secrets(dir: &Path, token_uri: &str) {
    let descriptor = json!({
        "web": {
            "client_id": "file-client-id",
            "client_secret": "file-client-secret",
            "auth_uri": "https://accounts.example.test/o/oauth2/auth",
            "token_uri": token_uri,
            "redirect_uris": [REDIRECT_URI]
        }
    });
    std::fs::write(dir.join("client_secret.json"), descriptor.to_string()).unwrap();
}

/// Build the app the way main does, from config and files on disk
fn create_test_app(config: Config) -> (Router, AppState) {
    let secrets = load_client_secrets(&config.credential_source(), &config.redirect_uri).unwrap();
    let auth_manager = Arc::new(
        AuthManager::new(
            secrets,
            TokenStore::new(config.token_file.clone()),
            config.scopes.clone(),
            config.token_refresh_threshold,
            config.session_secret.clone(),
        )
        .unwrap(),
    );
    let http_client = Arc::new(
        YouTubeHttpClient::new(
            auth_manager.clone(),
            config.http_connect_timeout,
            config.http_request_timeout,
            config.http_max_retries,
        )
        .unwrap(),
    );
    let state = AppState {
        auth_manager,
        youtube: YouTubeApi::new(http_client, config.youtube_api_url.clone()),
        config: Arc::new(config),
    };
    (routes::build_app(state.clone()), state)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn read_token_file(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ==================================================================================================
// Consent flow
// ==================================================================================================

#[tokio::test]
async fn test_consent_flow_persists_token() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code-123".into()),
            Matcher::UrlEncoded("client_id".into(), "file-client-id".into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": "ya29.fresh",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "scope": YOUTUBE_SCOPE,
                "token_type": "Bearer"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), &format!("{}/token", server.url()));
    let config = test_config(dir.path(), &server.url());
    let token_file = config.token_file.clone();
    let (app, state) = create_test_app(config);

    // Start sign-in
    let response = app.clone().oneshot(get("/login")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let consent_url = reqwest::Url::parse(&location).unwrap();
    let state_param = consent_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(consent_url
        .query_pairs()
        .any(|(k, v)| k == "code_challenge_method" && v == "S256"));

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // Google redirects back with the code
    let callback = Request::builder()
        .uri(format!(
            "/oauth2callback?code=auth-code-123&state={}",
            state_param
        ))
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(callback).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    token_mock.assert_async().await;
    assert!(state.auth_manager.is_authenticated().await);

    let saved = read_token_file(&token_file);
    assert_eq!(saved["access_token"], "ya29.fresh");
    assert_eq!(saved["refresh_token"], "1//refresh");
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), &format!("{}/token", server.url()));
    let config = test_config(dir.path(), &server.url());
    let token_file = config.token_file.clone();
    let (app, _state) = create_test_app(config);

    let response = app.clone().oneshot(get("/login")).await.unwrap();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let callback = Request::builder()
        .uri("/oauth2callback?code=auth-code&state=attacker-state")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(callback).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(response).await.contains("state mismatch"));

    token_mock.assert_async().await;
    assert!(!token_file.exists());
}

// ==================================================================================================
// Token refresh
// ==================================================================================================

#[tokio::test]
async fn test_expired_token_refreshes_once() {
    let mut server = mockito::Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.renewed","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let playlists_mock = server
        .mock("GET", "/playlists")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer ya29.renewed")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items":[{"id":"PL1","snippet":{"title":"Favourites"},"contentDetails":{"itemCount":3}}]}"#)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), &format!("{}/token", server.url()));
    let config = test_config(dir.path(), &server.url());

    // Legacy layout with an expiry in the past
    std::fs::write(
        &config.token_file,
        json!({
            "token": "ya29.stale",
            "refresh_token": "1//refresh",
            "token_uri": format!("{}/token", server.url()),
            "client_id": "file-client-id",
            "client_secret": "file-client-secret",
            "scopes": [YOUTUBE_SCOPE],
            "expiry": "2020-01-01T00:00:00"
        })
        .to_string(),
    )
    .unwrap();
    let token_file = config.token_file.clone();
    let (app, _state) = create_test_app(config);

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Favourites"));
    }

    refresh_mock.assert_async().await;
    playlists_mock.assert_async().await;

    // Refresh response had no refresh_token; the old one is kept
    let saved = read_token_file(&token_file);
    assert_eq!(saved["access_token"], "ya29.renewed");
    assert_eq!(saved["refresh_token"], "1//refresh");
}

#[tokio::test]
async fn test_rejected_refresh_discards_token() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), &format!("{}/token", server.url()));
    let config = test_config(dir.path(), &server.url());
    std::fs::write(
        &config.token_file,
        json!({
            "access_token": "ya29.stale",
            "refresh_token": "1//revoked",
            "token_uri": format!("{}/token", server.url()),
            "expiry": "2020-01-01T00:00:00Z"
        })
        .to_string(),
    )
    .unwrap();
    let token_file = config.token_file.clone();
    let (app, state) = create_test_app(config);

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let html = body_string(response).await;
    assert!(html.contains("Token refresh failed"));
    assert!(html.contains("href=\"/login\""));

    assert!(!token_file.exists());
    assert!(!state.auth_manager.is_authenticated().await);
}

// ==================================================================================================
// Client credentials
// ==================================================================================================

#[test]
fn test_env_credentials_ignore_file() {
    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), "https://oauth2.example.test/token");

    let source = CredentialSource {
        client_id: Some("env-id".to_string()),
        client_secret: Some("env-secret".to_string()),
        secrets_file: dir.path().join("client_secret.json"),
    };
    let secrets = load_client_secrets(&source, REDIRECT_URI).unwrap();
    assert_eq!(secrets.client_id, "env-id");
    assert_eq!(secrets.client_secret, "env-secret");
}

#[test]
fn test_missing_or_corrupt_secrets_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = CredentialSource {
        client_id: None,
        client_secret: None,
        secrets_file: dir.path().join("client_secret.json"),
    };

    let err = load_client_secrets(&source, REDIRECT_URI).unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));

    std::fs::write(&source.secrets_file, "{ not json").unwrap();
    let err = load_client_secrets(&source, REDIRECT_URI).unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(ref m) if m.contains("Malformed")));
}

// ==================================================================================================
// Playlist management
// ==================================================================================================

fn signed_in_app(dir: &Path, server_url: &str) -> (Router, AppState) {
    write_client_secrets(dir, &format!("{}/token", server_url));
    let config = test_config(dir, server_url);
    std::fs::write(
        &config.token_file,
        json!({
            "access_token": "ya29.valid",
            "refresh_token": "1//refresh",
            "token_uri": format!("{}/token", server_url),
            "expiry": "2999-01-01T00:00:00Z"
        })
        .to_string(),
    )
    .unwrap();
    create_test_app(config)
}

#[tokio::test]
async fn test_bulk_delete_reports_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/playlists")
        .match_query(Matcher::UrlEncoded("id".into(), "PL1".into()))
        .with_status(204)
        .create_async()
        .await;
    server
        .mock("DELETE", "/playlists")
        .match_query(Matcher::UrlEncoded("id".into(), "PL2".into()))
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"Forbidden"}}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = signed_in_app(dir.path(), &server.url());

    let request = Request::builder()
        .method("POST")
        .uri("/delete-bulk")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"playlist_ids":["PL1","PL2"]}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["failures"].as_array().unwrap().len(), 1);
    assert_eq!(body["failures"][0]["id"], "PL2");
}

#[tokio::test]
async fn test_bulk_delete_items() {
    let mut server = mockito::Server::new_async().await;
    let delete_mock = server
        .mock("DELETE", "/playlistItems")
        .match_query(Matcher::Regex("id=IT[12]".into()))
        .with_status(204)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = signed_in_app(dir.path(), &server.url());

    let request = Request::builder()
        .method("POST")
        .uri("/playlist/PL1/items/delete-bulk")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"playlist_item_ids":["IT1","IT2"]}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["success"], true);
    delete_mock.assert_async().await;
}

#[tokio::test]
async fn test_json_routes_unauthorized_when_signed_out() {
    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), "http://127.0.0.1:9/token");
    let (app, _state) = create_test_app(test_config(dir.path(), "http://127.0.0.1:9"));

    let response = app.oneshot(get("/playlist/PL1/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["type"], "not_authenticated");
}

#[tokio::test]
async fn test_logout_removes_token_file() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = signed_in_app(dir.path(), "http://127.0.0.1:9");
    let token_file = state.config.token_file.clone();
    assert!(token_file.exists());

    let response = app.clone().oneshot(get("/logout")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(!token_file.exists());

    // Back to the landing page
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Sign in with Google"));
}

// ==================================================================================================
// Health
// ==================================================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_client_secrets(dir.path(), "http://127.0.0.1:9/token");
    let (app, _state) = create_test_app(test_config(dir.path(), "http://127.0.0.1:9"));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
