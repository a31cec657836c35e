// Token endpoint requests: authorization-code exchange and refresh

use anyhow::Context;
use reqwest::Client;
use thiserror::Error;

use super::types::{ClientSecrets, OAuthErrorResponse, TokenData, TokenResponse};

/// Failure talking to the token endpoint
#[derive(Error, Debug)]
pub enum GrantError {
    /// The endpoint answered with an error status (e.g. invalid_grant)
    #[error("{status} - {message}")]
    Rejected { status: u16, message: String },

    /// The request could not be completed or the response was unusable
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    client: &Client,
    secrets: &ClientSecrets,
    code: &str,
    code_verifier: &str,
) -> Result<TokenData, GrantError> {
    tracing::info!("Exchanging authorization code at {}", secrets.token_uri);

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", secrets.redirect_uri.as_str()),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("code_verifier", code_verifier),
    ];

    let data = post_grant(client, &secrets.token_uri, &form).await?;

    tracing::info!(
        "Authorization code exchanged, expires: {}",
        data.expires_at
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(data)
}

/// Obtain a new access token with a refresh token
pub async fn refresh_access_token(
    client: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenData, GrantError> {
    tracing::info!("Refreshing access token via {}", token_uri);
    tracing::debug!(
        "Refresh request: client_id={}...",
        client_id_prefix(client_id)
    );

    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];

    let data = post_grant(client, token_uri, &form).await?;

    tracing::info!(
        "Access token refreshed, expires: {}",
        data.expires_at
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(data)
}

/// First characters of a client id, for logs
fn client_id_prefix(client_id: &str) -> String {
    client_id.chars().take(8).collect()
}

async fn post_grant(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenData, GrantError> {
    let response = client
        .post(token_uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(form)
        .send()
        .await
        .context("Failed to send token request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            "Token request failed: status={}, body={}",
            status,
            error_text
        );

        // Prefer the OAuth error code and description when the body carries them
        let message = match serde_json::from_str::<OAuthErrorResponse>(&error_text) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{}: {}", err.error, desc),
                None => err.error,
            },
            Err(_) => error_text,
        };

        return Err(GrantError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let data: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    if data.access_token.is_empty() {
        return Err(GrantError::Transport(anyhow::anyhow!(
            "Token response does not contain access_token"
        )));
    }

    Ok(data.into_token_data())
}
