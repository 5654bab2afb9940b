//! PulseCheck: employee-feedback surveys with AI sentiment scoring and
//! review flags for HR.
//!
//! Survey answers are stored in SQLite. Text answers are classified by a hosted
//! chat-completions model; negative verdicts and low ratings raise flags that
//! HR managers review from the dashboard endpoints.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod intelligence;
mod migrations;
pub mod notification;
pub mod services;
pub mod state;
pub mod util;

use tokio::net::TcpListener;
use tokio::signal;

use config::Config;
use error::ServiceError;
use state::AppState;

/// Open storage, bind the configured port and serve until Ctrl+C or SIGTERM.
pub async fn run_server(config: Config) -> Result<(), ServiceError> {
    log::info!("Initializing state...");
    let port = config.port;
    let state = AppState::open(config)?;
    let app = http::router(state);

    let address = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&address).await.map_err(|e| {
        ServiceError::Config(config::ConfigError::Invalid {
            key: "PULSECHECK_PORT".to_string(),
            value: port.to_string(),
            reason: e.to_string(),
        })
    })?;
    log::info!("Server running on {}", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", e);
    }

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => log::warn!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::warn!("Failed to install signal handler: {}", e);
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
