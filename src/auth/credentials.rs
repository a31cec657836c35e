// Client credential loading from environment or client_secret.json

use std::path::{Path, PathBuf};

use super::types::{ClientSecrets, ClientSecretsFile, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
use crate::error::ApiError;

/// Where client credentials may come from
#[derive(Debug, Clone)]
pub struct CredentialSource {
    /// Client ID given directly (YT_CLIENT_ID / CLIENT_ID)
    pub client_id: Option<String>,
    /// Client secret given directly (YT_CLIENT_SECRET / CLIENT_SECRET)
    pub client_secret: Option<String>,
    /// Client secrets file (YT_CLIENT_SECRETS, default client_secret.json)
    pub secrets_file: PathBuf,
}

/// Resolve the OAuth client identity.
///
/// An explicit id/secret pair wins; otherwise the client secrets file is read.
pub fn load_client_secrets(
    source: &CredentialSource,
    redirect_uri: &str,
) -> Result<ClientSecrets, ApiError> {
    let client_id = non_empty(source.client_id.as_deref());
    let client_secret = non_empty(source.client_secret.as_deref());

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => {
            tracing::info!("Using OAuth client credentials from environment");
            return Ok(ClientSecrets {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
                redirect_uri: redirect_uri.to_string(),
                auth_uri: DEFAULT_AUTH_URI.to_string(),
                token_uri: DEFAULT_TOKEN_URI.to_string(),
            });
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                "Only one of client ID / client secret is set; falling back to {}",
                source.secrets_file.display()
            );
        }
        (None, None) => {}
    }

    load_from_file(&source.secrets_file, redirect_uri)
}

/// Load credentials from a Google OAuth client descriptor
pub fn load_from_file(path: &Path, redirect_uri: &str) -> Result<ClientSecrets, ApiError> {
    if !path.exists() {
        return Err(ApiError::ConfigError(format!(
            "Missing OAuth client secrets file. Download it from Google Cloud Console and save it as '{}', or set CLIENT_ID and CLIENT_SECRET.",
            path.display()
        )));
    }

    tracing::info!("Loading OAuth client secrets from {}", path.display());

    let raw = std::fs::read_to_string(path).map_err(|e| {
        ApiError::ConfigError(format!(
            "Failed to read client secrets file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file: ClientSecretsFile = serde_json::from_str(&raw).map_err(|e| {
        ApiError::ConfigError(format!(
            "Malformed client secrets file {}: {}",
            path.display(),
            e
        ))
    })?;

    let entry = file.web.or(file.installed).ok_or_else(|| {
        ApiError::ConfigError(format!(
            "Client secrets file {} has neither a \"web\" nor an \"installed\" section",
            path.display()
        ))
    })?;

    if entry.client_id.trim().is_empty() || entry.client_secret.trim().is_empty() {
        return Err(ApiError::ConfigError(format!(
            "Client secrets file {} has an empty client_id or client_secret",
            path.display()
        )));
    }

    Ok(ClientSecrets {
        client_id: entry.client_id,
        client_secret: entry.client_secret,
        redirect_uri: redirect_uri.to_string(),
        auth_uri: entry.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
        token_uri: entry.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
