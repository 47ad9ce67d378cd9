//! buzza-server - REST API server binary.

use buzza_core::BuzzaConfig;
use buzza_server::{create_server, AppState};
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("buzza_server=debug".parse()?);
    let json_logs = std::env::var("BUZZA_LOG_FORMAT").is_ok_and(|f| f == "json");
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Configuration file wins over the environment when given
    let config = match std::env::var("BUZZA_CONFIG") {
        Ok(path) => BuzzaConfig::from_file(path)?,
        Err(_) => BuzzaConfig::from_env()?,
    };
    info!(
        database = %config.database_path.display(),
        timeout_ms = config.request_timeout_ms,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config)?;
    let app = create_server(state);

    let addr = config.bind_addr();
    info!("Starting buzza-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server stopped cleanly");
    Ok(())
}
