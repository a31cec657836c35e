use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self as axum_middleware},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{AuthManager, CallbackParams};
use crate::config::Config;
use crate::error::{ApiError, PageError};
use crate::middleware;
use crate::models::youtube::BulkDeleteOutcome;
use crate::playlists::{self, SortParams};
use crate::views;
use crate::youtube::YouTubeApi;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cookie carrying the signed OAuth state between /login and the callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub youtube: YouTubeApi,
    pub config: Arc<Config>,
}

/// Full application: pages, JSON API and health check behind request tracing
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(page_routes(state.clone()))
        .merge(api_routes(state))
        .layer(middleware::trace_layer())
}

/// Health check routes (no session required)
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// Browser-facing HTML routes and the OAuth flow
pub fn page_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/login", get(login_handler))
        .route("/oauth2callback", get(oauth_callback_handler))
        .route("/logout", get(logout_handler))
        .route("/delete/:playlist_id", post(delete_playlist_handler))
        .with_state(state)
}

/// JSON routes used by the page scripts (require a signed-in session)
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/delete-bulk", post(bulk_delete_playlists_handler))
        .route("/playlist/:playlist_id/items", get(playlist_items_handler))
        .route(
            "/playlist/:playlist_id/items/delete-bulk",
            post(bulk_delete_items_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .with_state(state)
}

/// GET /health - Health check
///
/// This endpoint does not require a session (for load balancers).
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET / - Landing page, or the playlist table when signed in
async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<SortParams>,
) -> Result<Html<String>, PageError> {
    if !state.auth_manager.is_authenticated().await {
        return Ok(views::landing_page());
    }

    let (key, order) = (params.key(), params.order());
    tracing::info!(
        "Request to /: sort={}, order={}",
        key.as_str(),
        order.as_str()
    );

    let mut items = state.youtube.list_playlists().await?;
    playlists::sort_playlists(&mut items, key, order);
    let totals = playlists::totals(&items);

    Ok(views::playlists_page(&items, key, order, totals))
}

/// GET /login - Start the consent flow
async fn login_handler(State(state): State<AppState>) -> Result<Response, PageError> {
    let request = state.auth_manager.begin_authorization().await?;
    tracing::info!("Redirecting to the consent screen");

    let cookie = state_cookie(&request.signed_state, is_secure(&state.config));
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&request.url)).into_response())
}

/// GET /oauth2callback - Finish the consent flow
async fn oauth_callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let cookie = read_cookie(&headers, OAUTH_STATE_COOKIE);
    let result = state
        .auth_manager
        .complete_authorization(&params, cookie.as_deref())
        .await;

    // The state is single use either way
    let clear = [(header::SET_COOKIE, clear_state_cookie())];
    match result {
        Ok(()) => (clear, Redirect::to("/")).into_response(),
        Err(e) => {
            tracing::warn!("Sign-in failed: {}", e);
            (clear, PageError(e)).into_response()
        }
    }
}

/// GET /logout - Forget the token
async fn logout_handler(State(state): State<AppState>) -> Result<Response, PageError> {
    state.auth_manager.sign_out().await?;
    Ok((
        [(header::SET_COOKIE, clear_state_cookie())],
        Redirect::to("/"),
    )
        .into_response())
}

/// POST /delete/:playlist_id - Delete one playlist
///
/// Answers XHR callers with JSON; form posts are redirected back to the
/// listing with the same sorting.
async fn delete_playlist_handler(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Query(params): Query<SortParams>,
    headers: HeaderMap,
) -> Response {
    let xhr = is_xhr(&headers);

    if !state.auth_manager.is_authenticated().await {
        if xhr {
            return ApiError::NotAuthenticated.into_response();
        }
        return Redirect::to("/").into_response();
    }

    tracing::info!("Request to delete playlist {}", playlist_id);

    match state.youtube.delete_playlist(&playlist_id).await {
        Ok(()) if xhr => Json(json!({ "success": true })).into_response(),
        Ok(()) => Redirect::to(&format!(
            "/?sort={}&order={}",
            params.key().as_str(),
            params.order().as_str()
        ))
        .into_response(),
        Err(e) if xhr => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.user_message() })),
        )
            .into_response(),
        Err(e) => PageError(e).into_response(),
    }
}

/// POST /delete-bulk - Delete several playlists
///
/// Body: `{"playlist_ids": [...]}`. Anything else is answered with 400.
async fn bulk_delete_playlists_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BulkDeleteOutcome>, ApiError> {
    let playlist_ids = requested_ids(&body, "playlist_ids")
        .ok_or_else(|| ApiError::ValidationError("No playlists provided".to_string()))?;

    tracing::info!("Request to delete {} playlists", playlist_ids.len());
    Ok(Json(state.youtube.delete_playlists(&playlist_ids).await))
}

/// GET /playlist/:playlist_id/items - Videos of one playlist
async fn playlist_items_handler(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let items = state.youtube.list_playlist_items(&playlist_id).await?;
    Ok(Json(json!({ "items": items })))
}

/// POST /playlist/:playlist_id/items/delete-bulk - Remove videos from a playlist
async fn bulk_delete_items_handler(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    body: Bytes,
) -> Result<Json<BulkDeleteOutcome>, ApiError> {
    let item_ids = requested_ids(&body, "playlist_item_ids").ok_or_else(|| {
        ApiError::ValidationError("No playlist items provided".to_string())
    })?;

    tracing::info!(
        "Request to remove {} items from playlist {}",
        item_ids.len(),
        playlist_id
    );
    Ok(Json(state.youtube.delete_playlist_items(&item_ids).await))
}

/// Ids listed under `field` of a JSON object body
///
/// None unless the body parses and the field is a non-empty array of strings.
/// The content type is not checked.
fn requested_ids(body: &[u8], field: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let ids = value
        .get(field)?
        .as_array()?
        .iter()
        .map(|id| id.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    (!ids.is_empty()).then_some(ids)
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn is_secure(config: &Config) -> bool {
    config.redirect_uri.starts_with("https://")
}

fn state_cookie(value: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=600{}",
        OAUTH_STATE_COOKIE,
        value,
        if secure { "; Secure" } else { "" }
    )
}

fn clear_state_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        OAUTH_STATE_COOKIE
    )
}

/// Value of a cookie from the request's Cookie headers
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
