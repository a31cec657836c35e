use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::pkce::{generate_pkce, sign_state, verify_state};
use super::refresh::{self, GrantError};
use super::store::TokenStore;
use super::types::{ClientSecrets, StoredToken};
use crate::error::ApiError;

/// How long a started sign-in stays valid
const PENDING_AUTHORIZATION_TTL_SECS: i64 = 600;

/// Sign-in started by /login and awaiting the OAuth callback
struct PendingAuthorization {
    state: String,
    code_verifier: String,
    created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::seconds(PENDING_AUTHORIZATION_TTL_SECS)
    }
}

/// Where to send the browser for consent
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Consent screen URL
    pub url: String,
    /// Signed state value to hand to the browser as a cookie
    pub signed_state: String,
}

/// Query parameters Google sends to the OAuth callback
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Authentication manager
/// Owns the OAuth session: consent flow, token persistence and refresh
pub struct AuthManager {
    /// OAuth client identity
    secrets: ClientSecrets,

    /// Scopes requested at consent
    scopes: Vec<String>,

    /// Token file
    store: TokenStore,

    /// Current token, if signed in
    token: Arc<RwLock<Option<StoredToken>>>,

    /// Sign-in awaiting its callback
    pending: Mutex<Option<PendingAuthorization>>,

    /// Serializes refreshes so concurrent callers trigger only one
    refresh_lock: Mutex<()>,

    /// Secret used to sign the state cookie
    state_secret: String,

    /// HTTP client for token endpoint requests
    client: Client,

    /// Token refresh threshold in seconds (default: 300 = 5 minutes)
    refresh_threshold: i64,
}

impl AuthManager {
    /// Create a new AuthManager, picking up any token already on disk
    pub fn new(
        secrets: ClientSecrets,
        store: TokenStore,
        scopes: Vec<String>,
        refresh_threshold: i64,
        state_secret: String,
    ) -> Result<Self> {
        let token = store.load(&scopes);
        match token {
            Some(ref t) => tracing::info!(
                "Loaded saved token from {} (expires: {})",
                store.path().display(),
                t.expiry
                    .map(|e| e.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
            None => tracing::info!("No saved token; sign-in required"),
        }

        // Create HTTP client with timeout
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            secrets,
            scopes,
            store,
            token: Arc::new(RwLock::new(token)),
            pending: Mutex::new(None),
            refresh_lock: Mutex::new(()),
            state_secret,
            client,
            refresh_threshold,
        })
    }

    /// Whether a token is available (it may still need a refresh)
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Start the authorization-code flow
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest, ApiError> {
        let state = uuid::Uuid::new_v4().to_string();
        let pkce = generate_pkce();
        let scope = self.scopes.join(" ");

        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.secrets.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("code_challenge", pkce.code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| {
            ApiError::ConfigError(format!(
                "Invalid auth_uri '{}': {}",
                self.secrets.auth_uri, e
            ))
        })?;

        let signed_state = sign_state(&self.state_secret, &state);

        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            tracing::debug!("Replacing previous sign-in attempt");
        }
        *pending = Some(PendingAuthorization {
            state,
            code_verifier: pkce.code_verifier,
            created_at: Utc::now(),
        });

        tracing::info!("Starting OAuth consent flow");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            signed_state,
        })
    }

    /// Finish the authorization-code flow from the callback parameters
    ///
    /// `state_cookie` is the signed state handed to the browser by
    /// [`begin_authorization`](Self::begin_authorization).
    pub async fn complete_authorization(
        &self,
        params: &CallbackParams,
        state_cookie: Option<&str>,
    ) -> Result<(), ApiError> {
        if let Some(ref error) = params.error {
            tracing::warn!("Consent was not granted: {}", error);
            return Err(ApiError::AuthError(format!("consent denied ({})", error)));
        }

        let state = params
            .state
            .as_deref()
            .ok_or_else(|| ApiError::AuthError("callback is missing the state parameter".into()))?;

        let cookie_nonce = state_cookie
            .and_then(|c| verify_state(&self.state_secret, c))
            .ok_or_else(|| {
                ApiError::AuthError("sign-in state cookie is missing or invalid".into())
            })?;

        if cookie_nonce != state {
            tracing::warn!("OAuth state does not match the browser's state cookie");
            return Err(ApiError::AuthError("state mismatch".into()));
        }

        // Only a verified callback consumes the sign-in in progress
        let pending = {
            let mut slot = self.pending.lock().await;
            if slot.as_ref().is_some_and(|p| p.state == state) {
                slot.take()
            } else {
                None
            }
        }
        .ok_or_else(|| {
            ApiError::AuthError("no matching sign-in in progress; please start again".into())
        })?;

        if pending.is_expired() {
            return Err(ApiError::AuthError(
                "sign-in took too long; please start again".into(),
            ));
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::AuthError("callback is missing the authorization code".into()))?;

        let data = refresh::exchange_code(&self.client, &self.secrets, code, &pending.code_verifier)
            .await
            .map_err(|e| ApiError::AuthError(format!("token exchange failed: {}", e)))?;

        if data.refresh_token.is_none() {
            tracing::warn!("Token response carried no refresh_token; re-consent will be needed on expiry");
        }

        let token = StoredToken {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            token_uri: self.secrets.token_uri.clone(),
            client_id: Some(self.secrets.client_id.clone()),
            client_secret: Some(self.secrets.client_secret.clone()),
            scopes: data.scopes.unwrap_or_else(|| self.scopes.clone()),
            expiry: data.expires_at,
        };

        self.persist(&token);
        *self.token.write().await = Some(token);

        tracing::info!("✅ Signed in");
        Ok(())
    }

    /// Get a valid access token, refreshing if necessary
    /// Only one refresh runs at a time; waiters reuse its result
    pub async fn get_access_token(&self) -> Result<String, ApiError> {
        {
            let token = self.token.read().await;
            match *token {
                None => return Err(ApiError::NotAuthenticated),
                Some(ref t) if !t.expires_within(self.refresh_threshold) => {
                    return Ok(t.access_token.clone())
                }
                Some(_) => {}
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let current = match self.token.read().await.clone() {
            None => return Err(ApiError::NotAuthenticated),
            Some(t) => t,
        };
        if !current.expires_within(self.refresh_threshold) {
            return Ok(current.access_token);
        }

        match self.refresh_token(&current).await {
            Ok(access_token) => Ok(access_token),
            Err(RefreshFailure::Rejected(message)) => {
                tracing::error!("Refresh token rejected: {}", message);
                self.discard_token().await;
                Err(ApiError::TokenRefreshError(format!(
                    "{}. Please sign in again.",
                    message
                )))
            }
            Err(RefreshFailure::Unavailable(message)) => {
                tracing::error!("Token refresh failed: {}", message);

                // Graceful degradation: if token isn't actually expired yet, use it
                if !current.is_expired() {
                    tracing::warn!("Using existing token despite refresh failure (not yet expired)");
                    return Ok(current.access_token);
                }

                Err(ApiError::TokenRefreshError(message))
            }
        }
    }

    /// Refresh the access token and persist the result
    async fn refresh_token(&self, current: &StoredToken) -> Result<String, RefreshFailure> {
        tracing::debug!("Refreshing access token...");

        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            RefreshFailure::Rejected("no refresh token is stored".to_string())
        })?;

        let client_id = current
            .client_id
            .as_deref()
            .unwrap_or(&self.secrets.client_id);
        let client_secret = current
            .client_secret
            .as_deref()
            .unwrap_or(&self.secrets.client_secret);

        let data = refresh::refresh_access_token(
            &self.client,
            &current.token_uri,
            client_id,
            client_secret,
            refresh_token,
        )
        .await
        .map_err(|e| match e {
            GrantError::Rejected { status, message } if (400..500).contains(&status) => {
                RefreshFailure::Rejected(format!("{} - {}", status, message))
            }
            other => RefreshFailure::Unavailable(other.to_string()),
        })?;

        let mut refreshed = current.clone();
        refreshed.apply_refresh(data);
        let access_token = refreshed.access_token.clone();

        self.persist(&refreshed);
        *self.token.write().await = Some(refreshed);

        Ok(access_token)
    }

    /// Forget the token and delete the token file
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        *self.pending.lock().await = None;
        *self.token.write().await = None;
        self.store.remove()?;
        tracing::info!("Signed out");
        Ok(())
    }

    async fn discard_token(&self) {
        *self.token.write().await = None;
        if let Err(e) = self.store.remove() {
            tracing::warn!("Failed to remove rejected token: {:#}", e);
        }
    }

    fn persist(&self, token: &StoredToken) {
        if let Err(e) = self.store.save(token) {
            tracing::warn!("Failed to persist token: {:#}", e);
        }
    }
}

/// Why a refresh did not produce a token
enum RefreshFailure {
    /// The grant itself is no longer usable; re-consent is required
    Rejected(String),
    /// The token endpoint could not be reached or answered unusably
    Unavailable(String),
}
