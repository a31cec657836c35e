// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Google's OAuth consent endpoint
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's OAuth token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scope granting read/write access to the user's YouTube account
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// OAuth client identity, resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
}

/// Google OAuth client descriptor (client_secret.json)
#[derive(Debug, Deserialize)]
pub struct ClientSecretsFile {
    pub web: Option<ClientSecretsEntry>,
    pub installed: Option<ClientSecretsEntry>,
}

/// Body of the "web" or "installed" section of a client descriptor
#[derive(Debug, Deserialize)]
pub struct ClientSecretsEntry {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub redirect_uris: Vec<String>,
}

/// Token state as persisted to the token file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Token is past its expiry
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(exp) => Utc::now() >= exp,
            None => false,
        }
    }

    /// Token expires within `threshold_secs` (tokens without expiry never do)
    pub fn expires_within(&self, threshold_secs: i64) -> bool {
        match self.expiry {
            Some(exp) => match expires_after(threshold_secs) {
                Some(deadline) => exp <= deadline,
                None => threshold_secs > 0,
            },
            None => false,
        }
    }

    /// Apply a refresh response, keeping the old refresh token if none was issued
    pub fn apply_refresh(&mut self, data: TokenData) {
        self.access_token = data.access_token;
        if data.refresh_token.is_some() {
            self.refresh_token = data.refresh_token;
        }
        if let Some(scopes) = data.scopes {
            self.scopes = scopes;
        }
        self.expiry = data.expires_at;
    }
}

/// Token data from a token endpoint response
#[derive(Debug, Clone)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<Vec<String>>,
}

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    #[allow(dead_code)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_token_data(self) -> TokenData {
        // Lifetimes chrono cannot represent are treated as no expiry
        let expires_at = self.expires_in.and_then(expires_after);
        TokenData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            scopes: self.scope.map(|s| split_scopes(&s)),
        }
    }
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`)
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// `now + secs`, or None when it falls outside chrono's range
pub fn expires_after(secs: i64) -> Option<DateTime<Utc>> {
    chrono::Duration::try_seconds(secs).and_then(|d| Utc::now().checked_add_signed(d))
}

/// Split a space separated scope string
pub fn split_scopes(s: &str) -> Vec<String> {
    s.split(' ')
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}
