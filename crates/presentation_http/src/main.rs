//! Ollama chat web server
//!
//! Main entry point: loads configuration, waits for the Ollama server, then
//! serves the chat UI.

use std::path::PathBuf;

use clap::Parser;
use infrastructure::{AppConfig, default_filter, init_tracing};
use presentation_http::{AppState, routes, spawn_session_cleanup_task};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Browser chat UI for a local Ollama server
#[derive(Debug, Parser)]
#[command(name = "ollama-chat-web", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Bind to all interfaces so an external tunnel can expose the UI
    #[arg(long)]
    share: bool,

    /// Base URL of the Ollama server
    #[arg(long)]
    ollama_url: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Apply flags on top of the loaded configuration
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.share {
            config.server.share = true;
        }
        if let Some(url) = &self.ollama_url {
            config.inference.base_url.clone_from(url);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(config.server.log_format, default_filter(cli.verbose))?;

    info!("Ollama chat v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        ollama = %config.inference.base_url,
        pull_command = ?config.pull.command,
        "Configuration loaded"
    );
    match &config.models_dir {
        Some(dir) => info!(models_dir = %dir, "Using Ollama models directory"),
        None => info!("OLLAMA_MODELS not set, Ollama uses its default models directory"),
    }

    let state = AppState::from_config(config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {e}"))?;

    let catalog = state
        .warmup()
        .run(config.chat.session.preferred_model.clone())
        .await;
    info!(
        models = catalog.models().len(),
        selected = catalog.selected().unwrap_or("none"),
        "Warm-up finished"
    );

    let cleanup = spawn_session_cleanup_task(
        state.sessions.clone(),
        config.server.session_idle_timeout(),
        config.server.cleanup_interval(),
    );

    let cors_layer = if config.server.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use axum::http::{HeaderValue, Method};
        let origins: Vec<HeaderValue> = config
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any)
    };

    let sessions = state.sessions.clone();
    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    if config.server.share {
        warn!(
            "--share binds to all interfaces but creates no public URL; \
             expose port {} with an external tunnel",
            config.server.port
        );
    }

    presentation_http::serve(
        listener,
        app,
        sessions,
        shutdown_signal(),
        config.server.shutdown_timeout(),
    )
    .await?;

    cleanup.abort();
    info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
