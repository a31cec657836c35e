use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use std::io::Write;
use std::path::PathBuf;

use crate::auth::{CredentialSource, YOUTUBE_SCOPE};
use crate::error::ApiError;
use crate::youtube::DEFAULT_API_URL;

/// Secret used when neither SESSION_SECRET_KEY nor FLASK_SECRET_KEY is set
pub const DEFAULT_SESSION_SECRET: &str = "dev_secret_key_change_me";

/// Upper bound for TOKEN_REFRESH_THRESHOLD (one day)
pub const MAX_TOKEN_REFRESH_THRESHOLD: i64 = 86_400;

/// YouTube Playlists - browse and clean up your playlists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "3000")]
    pub port: u16,

    /// OAuth client id (overrides the client secrets file)
    #[arg(long, env = "YT_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (overrides the client secrets file)
    #[arg(long, env = "YT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Path to the OAuth client secrets JSON file
    #[arg(short = 'c', long, env = "YT_CLIENT_SECRETS", default_value = "client_secret.json")]
    pub client_secrets: String,

    /// Path to the token file
    #[arg(short = 't', long, env = "YT_TOKEN_FILE")]
    pub token_file: Option<String>,

    /// OAuth redirect URI (defaults to http://<host>:<port>/oauth2callback)
    #[arg(long, env = "OAUTH_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP max retries
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "3")]
    pub http_retries: u32,

    /// Run interactive setup and write a .env file
    #[arg(long)]
    pub setup: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // OAuth client
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_secrets_file: PathBuf,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub insecure_transport: bool,

    // Session
    pub token_file: PathBuf,
    pub session_secret: String,
    pub token_refresh_threshold: i64,

    // YouTube API
    pub youtube_api_url: String,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_max_retries: u32,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Parse CLI arguments
        let args = CliArgs::parse();

        Ok(Self::from_args(args, |key| std::env::var(key).ok()))
    }

    /// Build the config from parsed arguments plus variables clap does not own
    pub fn from_args(args: CliArgs, env: impl Fn(&str) -> Option<String>) -> Self {
        // Blank values count as unset
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let redirect_uri = args
            .redirect_uri
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_redirect_uri(&args.host, args.port));

        Config {
            client_id: args
                .client_id
                .filter(|s| !s.trim().is_empty())
                .or_else(|| var("CLIENT_ID")),
            client_secret: args
                .client_secret
                .filter(|s| !s.trim().is_empty())
                .or_else(|| var("CLIENT_SECRET")),
            client_secrets_file: expand_tilde(&args.client_secrets),
            redirect_uri,
            scopes: var("YT_SCOPES")
                .map(|s| parse_scopes(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| vec![YOUTUBE_SCOPE.to_string()]),
            insecure_transport: var("OAUTHLIB_INSECURE_TRANSPORT")
                .map(|s| parse_flag(&s))
                .unwrap_or(true),

            token_file: args
                .token_file
                .filter(|s| !s.trim().is_empty())
                .or_else(|| var("TOKEN_FILE"))
                .map(|s| expand_tilde(&s))
                .unwrap_or_else(|| PathBuf::from("token.json")),
            session_secret: var("SESSION_SECRET_KEY")
                .or_else(|| var("FLASK_SECRET_KEY"))
                .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
            token_refresh_threshold: var("TOKEN_REFRESH_THRESHOLD")
                .and_then(|s| s.trim().parse::<i64>().ok())
                .filter(|secs| (0..=MAX_TOKEN_REFRESH_THRESHOLD).contains(secs))
                .unwrap_or(300),

            youtube_api_url: var("YOUTUBE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),

            http_connect_timeout: var("HTTP_CONNECT_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            http_request_timeout: args.http_timeout,
            http_max_retries: args.http_retries,

            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),

            server_host: args.host,
            server_port: args.port,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ApiError> {
        if !self.insecure_transport && !self.redirect_uri.starts_with("https://") {
            return Err(ApiError::ConfigError(format!(
                "OAUTHLIB_INSECURE_TRANSPORT is disabled but the redirect URI is not https: {}",
                self.redirect_uri
            )));
        }

        if self.server_port == 0 {
            return Err(ApiError::ConfigError("SERVER_PORT must not be 0".to_string()));
        }

        Ok(())
    }

    /// Where the OAuth client identity comes from
    pub fn credential_source(&self) -> CredentialSource {
        CredentialSource {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            secrets_file: self.client_secrets_file.clone(),
        }
    }

    pub fn uses_default_session_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Redirect URI derived from the listen address
fn default_redirect_uri(host: &str, port: u16) -> String {
    // A wildcard bind is not a usable browser address
    let host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
    format!("http://{}:{}/oauth2callback", host, port)
}

fn parse_scopes(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a boolean environment flag
fn parse_flag(s: &str) -> bool {
    !matches!(
        s.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(argv: &[&str], env: &[(&str, &str)]) -> Config {
        let mut full = vec!["yt-playlists"];
        full.extend_from_slice(argv);
        let args = CliArgs::try_parse_from(full).unwrap();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_args(args, |key| env.get(key).cloned())
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_default_redirect_uri() {
        assert_eq!(
            default_redirect_uri("127.0.0.1", 3000),
            "http://127.0.0.1:3000/oauth2callback"
        );
        assert_eq!(
            default_redirect_uri("0.0.0.0", 8080),
            "http://127.0.0.1:8080/oauth2callback"
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag(" no "));
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("json"), LogFormat::Json);
        assert_eq!(parse_log_format("JSON"), LogFormat::Json);
        assert_eq!(parse_log_format("text"), LogFormat::Text);
        assert_eq!(parse_log_format("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes("a, b,,c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_scopes(" , ").is_empty());
    }

    #[test]
    fn test_env_fallbacks() {
        let config = config_with(
            &["--host", "0.0.0.0", "--port", "8080"],
            &[
                ("CLIENT_ID", "legacy-id"),
                ("CLIENT_SECRET", "legacy-secret"),
                ("TOKEN_FILE", "/tmp/tok.json"),
                ("FLASK_SECRET_KEY", "flask-secret"),
                ("YT_SCOPES", "scope-a,scope-b"),
            ],
        );

        assert_eq!(config.client_id.as_deref(), Some("legacy-id"));
        assert_eq!(config.client_secret.as_deref(), Some("legacy-secret"));
        assert_eq!(config.token_file, PathBuf::from("/tmp/tok.json"));
        assert_eq!(config.session_secret, "flask-secret");
        assert_eq!(config.scopes, vec!["scope-a", "scope-b"]);
        assert_eq!(config.redirect_uri, "http://127.0.0.1:8080/oauth2callback");
    }

    #[test]
    fn test_flags_win_over_legacy_env() {
        let config = config_with(
            &["--client-id", "cli-id", "--token-file", "mine.json"],
            &[
                ("CLIENT_ID", "legacy-id"),
                ("TOKEN_FILE", "other.json"),
                ("SESSION_SECRET_KEY", "session"),
                ("FLASK_SECRET_KEY", "flask"),
            ],
        );
        assert_eq!(config.client_id.as_deref(), Some("cli-id"));
        assert_eq!(config.token_file, PathBuf::from("mine.json"));
        assert_eq!(config.session_secret, "session");
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[], &[]);
        assert_eq!(config.client_secrets_file, PathBuf::from("client_secret.json"));
        assert_eq!(config.token_file, PathBuf::from("token.json"));
        assert_eq!(config.scopes, vec![YOUTUBE_SCOPE.to_string()]);
        assert!(config.insecure_transport);
        assert!(config.uses_default_session_secret());
        assert_eq!(config.token_refresh_threshold, 300);
        assert_eq!(config.youtube_api_url, DEFAULT_API_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_threshold_bounds() {
        let config = config_with(&[], &[("TOKEN_REFRESH_THRESHOLD", "60")]);
        assert_eq!(config.token_refresh_threshold, 60);

        for raw in ["-5", "9223372036854775807", "86401", "soon"] {
            let config = config_with(&[], &[("TOKEN_REFRESH_THRESHOLD", raw)]);
            assert_eq!(config.token_refresh_threshold, 300, "{}", raw);
        }
    }

    #[test]
    fn test_secure_transport_requires_https_redirect() {
        let config = config_with(&[], &[("OAUTHLIB_INSECURE_TRANSPORT", "0")]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));

        let config = config_with(
            &["--redirect-uri", "https://playlists.example.com/oauth2callback"],
            &[("OAUTHLIB_INSECURE_TRANSPORT", "0")],
        );
        assert!(config.validate().is_ok());
    }
}

// === Interactive Setup ===

/// Whether `--setup` was passed; checked before the full parse so the .env it writes is picked up
pub fn setup_requested() -> bool {
    std::env::args().skip(1).any(|arg| arg == "--setup")
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub server_port: String,
    pub session_secret: String,
}

/// Run interactive setup to collect the OAuth client and server settings
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("YouTube Playlists - first time setup");
    println!();
    println!("Create an OAuth client of type \"Web application\" in the Google Cloud console");
    println!("and add http://127.0.0.1:<port>/oauth2callback as an authorized redirect URI.");
    println!();

    let client_id: String = Input::new()
        .with_prompt("OAuth client id (YT_CLIENT_ID)")
        .interact_text()
        .context("Failed to read YT_CLIENT_ID")?;

    if client_id.trim().is_empty() {
        anyhow::bail!("YT_CLIENT_ID cannot be empty");
    }

    let client_secret: String = Password::new()
        .with_prompt("OAuth client secret (YT_CLIENT_SECRET)")
        .interact()
        .context("Failed to read YT_CLIENT_SECRET")?;

    if client_secret.trim().is_empty() {
        anyhow::bail!("YT_CLIENT_SECRET cannot be empty");
    }

    println!();
    let server_port: String = Input::new()
        .with_prompt("Server port")
        .default("3000".to_string())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            match input.parse::<u16>() {
                Ok(port) if port > 0 => Ok(()),
                _ => Err("Enter a port between 1 and 65535"),
            }
        })
        .interact_text()
        .context("Failed to read server port")?;

    let config = InteractiveConfig {
        client_id: client_id.trim().to_string(),
        client_secret: client_secret.trim().to_string(),
        server_port,
        session_secret: uuid::Uuid::new_v4().simple().to_string(),
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("Configuration saved to .env file");
    }

    println!();
    println!("Setup complete! Starting server...");
    println!();

    Ok(config)
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = format!(
        r#"# YouTube Playlists configuration
# Generated by interactive setup

# OAuth client (overrides client_secret.json)
YT_CLIENT_ID={}
YT_CLIENT_SECRET={}

# Secret used to sign the sign-in state cookie
SESSION_SECRET_KEY={}

# Server settings
SERVER_HOST=127.0.0.1
SERVER_PORT={}

# Token file
YT_TOKEN_FILE=token.json

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.client_id, config.client_secret, config.session_secret, config.server_port,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
