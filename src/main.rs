use anyhow::Result;
use std::sync::Arc;

use yt_playlists::{
    auth,
    config::{self, LogFormat},
    http_client::YouTubeHttpClient,
    routes,
    youtube::YouTubeApi,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Interactive setup writes .env; export its values so Config::load() sees them
    if config::setup_requested() {
        let interactive_config = config::run_interactive_setup()?;

        std::env::set_var("YT_CLIENT_ID", &interactive_config.client_id);
        std::env::set_var("YT_CLIENT_SECRET", &interactive_config.client_secret);
        std::env::set_var("SERVER_PORT", &interactive_config.server_port);
        std::env::set_var("SESSION_SECRET_KEY", &interactive_config.session_secret);
    }

    // Load configuration first (for log level)
    let config = config::Config::load()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_file(true)
            .with_line_number(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .init(),
    }

    tracing::info!("🚀 YouTube Playlists starting...");
    config.validate()?;

    if config.uses_default_session_secret() {
        tracing::warn!(
            "SESSION_SECRET_KEY is not set; using the built-in development secret. Set it before exposing this server."
        );
    }

    // Resolve the OAuth client identity - fail fast on errors
    let secrets = match auth::load_client_secrets(&config.credential_source(), &config.redirect_uri)
    {
        Ok(secrets) => secrets,
        Err(e) => {
            tracing::error!("❌ {}", e);
            tracing::error!("");
            tracing::error!("🔧 Provide OAuth client credentials in one of these ways:");
            tracing::error!("   1. Set YT_CLIENT_ID and YT_CLIENT_SECRET (or run with --setup)");
            tracing::error!(
                "   2. Download the client JSON from the Google Cloud console to {}",
                config.client_secrets_file.display()
            );
            tracing::error!("");
            return Err(e.into());
        }
    };
    tracing::info!("✅ OAuth client loaded (redirect URI: {})", secrets.redirect_uri);

    // Initialize authentication manager
    let auth_manager = Arc::new(auth::AuthManager::new(
        secrets,
        auth::TokenStore::new(config.token_file.clone()),
        config.scopes.clone(),
        config.token_refresh_threshold,
        config.session_secret.clone(),
    )?);

    if auth_manager.is_authenticated().await {
        tracing::info!("✅ Saved session found");
    } else {
        tracing::info!("No saved session; open the server in a browser to sign in");
    }

    // Initialize HTTP client
    let http_client = Arc::new(YouTubeHttpClient::new(
        auth_manager.clone(),
        config.http_connect_timeout,
        config.http_request_timeout,
        config.http_max_retries,
    )?);
    tracing::info!("✅ HTTP client initialized");

    let youtube = YouTubeApi::new(http_client, config.youtube_api_url.clone());

    let app_state = routes::AppState {
        auth_manager,
        youtube,
        config: Arc::new(config.clone()),
    };

    // Build the application with routes and middleware
    let app = routes::build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Print startup banner
    print_startup_banner(&config);

    // Start server with graceful shutdown
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                 ▶  YouTube Playlists                      ║
║                                                           ║
║  Browse and clean up your playlists from the browser      ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:      {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:       http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Redirect URI: {}", config.redirect_uri);
    println!("  Token file:   {}", config.token_file.display());
    println!("  Log Level:    {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
