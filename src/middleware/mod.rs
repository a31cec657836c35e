// Session and request tracing middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::routes::AppState;

/// Session middleware for the JSON routes
///
/// Lets the request through only when a token is available. Expired tokens
/// still pass; the handler refreshes them on first use.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth_manager.is_authenticated().await {
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        "Request without a signed-in session: {} {}",
        request.method(),
        request.uri().path()
    );
    Err(ApiError::NotAuthenticated)
}

/// Request tracing layer
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
