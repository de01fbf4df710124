//! waba-relay web server.
//!
//! This binary:
//! - Verifies the WhatsApp webhook subscription handshake
//! - Receives message webhooks and broadcasts them to `/events` subscribers
//! - Replies to each sender with an echo message
//!
//! Configuration comes from the environment (and `.env` if present).

use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waba_relay::{router, AppState, Config, GraphClient, Registry};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Configuration errors are fatal
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "config_invalid");
            eprintln!("waba-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "web_server_failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        port = config.port,
        graph_api_url = %config.graph_api_url,
        graph_api_version = %config.graph_api_version,
        signature_verification = config.app_secret.is_some(),
        events_keep_alive_secs = config.events_keep_alive_secs,
        "config_loaded"
    );

    let graph = GraphClient::new(&config).context("Failed to create Graph API client")?;
    let registry = Registry::new();

    let port = config.port;
    let state = AppState::new(config, registry.clone(), graph);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Complete when a shutdown signal is received, closing every event stream
/// so that in-flight SSE responses finish and graceful shutdown can proceed.
/// Streams opened on connections axum accepts after this point end at once.
async fn shutdown_signal(registry: Registry) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");

    registry.shutdown();
}
