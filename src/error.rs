// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::views;

/// Errors that can occur while serving a request
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid OAuth client credentials
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Consent was denied or the authorization code exchange failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// The stored token could not be refreshed; the user must sign in again
    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    /// No token is available for this session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from the YouTube Data API
    #[error("YouTube API error: {status} - {message}")]
    YouTubeApiError { status: u16, message: String },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::TokenRefreshError(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::YouTubeApiError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::ConfigError(_) => "config_error",
            ApiError::AuthError(_) => "auth_error",
            ApiError::TokenRefreshError(_) => "token_refresh_error",
            ApiError::NotAuthenticated => "not_authenticated",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::YouTubeApiError { .. } => "youtube_api_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Whether signing in again is the way out of this error
    pub fn needs_sign_in(&self) -> bool {
        matches!(
            self,
            ApiError::AuthError(_) | ApiError::TokenRefreshError(_) | ApiError::NotAuthenticated
        )
    }

    /// Message safe to show to the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.user_message();

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

/// Error rendered as the HTML failure page instead of JSON
#[derive(Debug)]
pub struct PageError(pub ApiError);

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let page = views::error_page(&self.0.user_message(), self.0.needs_sign_in());
        (status, page).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
