// Token file persistence

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::types::{split_scopes, StoredToken, DEFAULT_TOKEN_URI};

/// Reads and writes the token file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

/// Any of the token layouts we accept on read
///
/// Covers the authorized-user layout (`token`, `expiry`), the raw token
/// response layout (`access_token`, `scope`, `expiry_date` in epoch millis)
/// and our own written layout.
#[derive(Debug, Default, Deserialize)]
struct SavedTokenFile {
    token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scopes: Option<ScopeField>,
    scope: Option<ScopeField>,
    expiry: Option<String>,
    expiry_date: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeField {
    List(Vec<String>),
    Joined(String),
}

impl ScopeField {
    fn into_vec(self) -> Vec<String> {
        match self {
            ScopeField::List(list) => list,
            ScopeField::Joined(s) => split_scopes(&s),
        }
    }
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token, if any.
    ///
    /// Missing, unreadable or unrecognised files all mean "no token".
    pub fn load(&self, default_scopes: &[String]) -> Option<StoredToken> {
        if !self.path.exists() {
            tracing::debug!("No token file at {}", self.path.display());
            return None;
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let saved: SavedTokenFile = match serde_json::from_str(&raw) {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("Ignoring malformed token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let token = normalize(saved, default_scopes);
        if token.is_none() {
            tracing::warn!(
                "Token file {} does not contain an access token",
                self.path.display()
            );
        }
        token
    }

    /// Persist the token (temp file + rename, owner-only permissions)
    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create token directory: {}", parent.display())
                })?;
            }
        }

        let data = serde_json::to_string_pretty(token).context("Failed to serialize token")?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write token file: {}", tmp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", tmp_path.display()))?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace token file: {}", self.path.display()))?;

        tracing::debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Delete the token file; a missing file is not an error
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed token file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove token file: {}", self.path.display())),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn normalize(saved: SavedTokenFile, default_scopes: &[String]) -> Option<StoredToken> {
    let access_token = saved
        .token
        .filter(|t| !t.is_empty())
        .or(saved.access_token.filter(|t| !t.is_empty()))?;

    let expiry = match saved.expiry {
        Some(ref s) => parse_expiry(s),
        None => saved.expiry_date.and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single()),
    };

    let scopes = saved
        .scopes
        .or(saved.scope)
        .map(ScopeField::into_vec)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_scopes.to_vec());

    Some(StoredToken {
        access_token,
        refresh_token: saved.refresh_token.filter(|t| !t.is_empty()),
        token_uri: saved
            .token_uri
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        client_id: saved.client_id,
        client_secret: saved.client_secret,
        scopes,
        expiry,
    })
}

/// Parse an ISO 8601 expiry; timestamps without an offset are UTC
fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(Utc.from_utc_datetime(&naive)),
        Err(_) => {
            tracing::warn!("Dropping unparseable token expiry: {}", s);
            None
        }
    }
}
