use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stillreel_core::{config_path_from_env, load_config, validate_config, FfmpegEngineFactory};
use stillreel_server::api::{create_router, WsBroadcaster};
use stillreel_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = config_path_from_env();

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("FFmpeg binary: {:?}", config.engine.ffmpeg_path);
    info!(
        "Batch duration: {}s, size ceiling: {} bytes",
        config.batch.default_duration_secs, config.intake.max_file_bytes
    );

    // The engine is created on first use, so a missing ffmpeg only fails conversions
    let engine_factory = Arc::new(FfmpegEngineFactory::new(config.engine.clone()));

    let ws_broadcaster = WsBroadcaster::default();
    info!("WebSocket broadcaster initialized");

    let state = Arc::new(AppState::new(
        config.clone(),
        engine_factory,
        ws_broadcaster,
    ));

    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if state.orchestrator().is_running() {
        warn!("Batch run still in progress, its results will be discarded");
    }

    // Session state never outlives the process
    let report = state.results().clear_all_and_release();
    info!(
        "Released {} jobs ({} bytes)",
        report.removed.len(),
        report.released_bytes
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
