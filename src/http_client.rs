use anyhow::{Context, Result};
use reqwest::{header, Client, Request, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::error::ApiError;
use crate::models::youtube::GoogleErrorResponse;

/// HTTP client for the YouTube Data API with retry logic
pub struct YouTubeHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Authentication manager
    auth_manager: Arc<AuthManager>,

    /// Maximum number of retries
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl YouTubeHttpClient {
    /// Create a new HTTP client
    pub fn new(
        auth_manager: Arc<AuthManager>,
        connect_timeout: u64,
        request_timeout: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_manager,
            max_retries,
            base_delay_ms: 1000, // 1 second base delay
        })
    }

    /// Override the backoff base delay
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Execute an authorized request with retry logic
    /// Automatically handles:
    /// - 401: reported as an authentication failure (not retried)
    /// - 429: exponential backoff
    /// - 5xx: exponential backoff
    pub async fn request_with_retry(&self, mut request: Request) -> Result<Response, ApiError> {
        // Refreshes happen here, before the first attempt; auth errors are never retried
        let access_token = self.auth_manager.get_access_token().await?;
        let bearer: header::HeaderValue = format!("Bearer {}", access_token)
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid access token header: {}", e)))?;
        request.headers_mut().insert(header::AUTHORIZATION, bearer);

        let max_retries = self.max_retries;
        let mut attempt = 0;

        // Log request details
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(
            method = %method,
            url = %url,
            "Sending YouTube API request"
        );

        loop {
            // Clone the request for this attempt
            let req = request.try_clone().ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;

            tracing::debug!(
                attempt = attempt + 1,
                max_retries = max_retries,
                "Executing request attempt"
            );

            match self.client.execute(req).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    tracing::warn!(status = %status, url = %url, "Received error response");

                    match status.as_u16() {
                        401 => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(ApiError::AuthError(format!(
                                "YouTube rejected the access token ({}). Please sign in again.",
                                google_error_message(&body)
                            )));
                        }

                        // 429 or 5xx: Exponential backoff
                        429 | 500..=599 => {
                            if attempt < max_retries {
                                let delay = self.calculate_backoff_delay(attempt);
                                tracing::warn!(
                                    "Received {}, retrying after {}ms (attempt {}/{})",
                                    status,
                                    delay,
                                    attempt + 1,
                                    max_retries
                                );

                                tokio::time::sleep(Duration::from_millis(delay)).await;
                                attempt += 1;
                                continue;
                            }
                        }

                        _ => {}
                    }

                    // Non-retryable error or max retries exceeded
                    let error_text = response.text().await.unwrap_or_default();

                    tracing::error!(
                        status = status.as_u16(),
                        url = %url,
                        response_body = %error_text,
                        attempt = attempt + 1,
                        "YouTube API request failed"
                    );
                    return Err(ApiError::YouTubeApiError {
                        status: status.as_u16(),
                        message: google_error_message(&error_text),
                    });
                }

                Err(e) => {
                    // Categorize the error for better debugging
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    tracing::warn!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        attempt = attempt + 1,
                        "HTTP request error"
                    );

                    // Network error - retry with backoff
                    if attempt < max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            max_retries
                        );

                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "HTTP request failed after all retries"
                    );

                    return Err(ApiError::Internal(anyhow::anyhow!(
                        "HTTP request failed: {} (kind: {})",
                        e,
                        error_kind
                    )));
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        // Exponential backoff: base_delay * 2^attempt, plus up to 10% jitter
        let delay = self.base_delay_ms * 2_u64.pow(attempt);
        let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
        delay + jitter
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Pull the human-readable message out of a Google error body
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClientSecrets, StoredToken, TokenStore, YOUTUBE_SCOPE};

    fn auth_manager(dir: &tempfile::TempDir) -> Arc<AuthManager> {
        let store = TokenStore::new(dir.path().join("token.json"));
        store
            .save(&StoredToken {
                access_token: "test-token".into(),
                refresh_token: Some("refresh".into()),
                token_uri: "http://unused/token".into(),
                client_id: None,
                client_secret: None,
                scopes: vec![YOUTUBE_SCOPE.into()],
                expiry: None,
            })
            .unwrap();
        let secrets = ClientSecrets {
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://127.0.0.1:3000/oauth2callback".into(),
            auth_uri: "http://unused/auth".into(),
            token_uri: "http://unused/token".into(),
        };
        Arc::new(
            AuthManager::new(secrets, store, vec![YOUTUBE_SCOPE.into()], 300, "s".into()).unwrap(),
        )
    }

    #[test]
    fn test_backoff_calculation() {
        let dir = tempfile::tempdir().unwrap();
        let client = YouTubeHttpClient::new(auth_manager(&dir), 30, 300, 3).unwrap();

        let delay0 = client.calculate_backoff_delay(0);
        let delay1 = client.calculate_backoff_delay(1);
        let delay2 = client.calculate_backoff_delay(2);

        assert!((1000..=1100).contains(&delay0));
        assert!((2000..=2200).contains(&delay1));
        assert!((4000..=4400).contains(&delay2));
    }

    #[test]
    fn test_google_error_message() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[]}}"#;
        assert_eq!(
            google_error_message(body),
            "The request cannot be completed because you have exceeded your quota."
        );
        assert_eq!(google_error_message("plain failure"), "plain failure");
        assert_eq!(google_error_message(""), "no response body");
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = YouTubeHttpClient::new(auth_manager(&dir), 5, 5, 0).unwrap();
        let req = client
            .client()
            .get(format!("{}/ping", server.url()))
            .build()
            .unwrap();

        client.request_with_retry(req).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = YouTubeHttpClient::new(auth_manager(&dir), 5, 5, 2)
            .unwrap()
            .with_base_delay_ms(1);
        let req = client
            .client()
            .get(format!("{}/flaky", server.url()))
            .build()
            .unwrap();

        let err = client.request_with_retry(req).await.unwrap_err();
        assert!(matches!(err, ApiError::YouTubeApiError { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/secret")
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = YouTubeHttpClient::new(auth_manager(&dir), 5, 5, 3)
            .unwrap()
            .with_base_delay_ms(1);
        let req = client
            .client()
            .get(format!("{}/secret", server.url()))
            .build()
            .unwrap();

        let err = client.request_with_retry(req).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthError(_)));
        assert!(err.to_string().contains("Invalid Credentials"));
        mock.assert_async().await;
    }
}
