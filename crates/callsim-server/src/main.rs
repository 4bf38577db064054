//! callsim server binary - places nothing itself, but hosts the REST
//! surface the runner drives and the media-stream endpoint the telephony
//! provider connects to.
//!
//! Starts an axum HTTP server with structured logging, validated provider
//! credentials, and graceful shutdown on SIGTERM/SIGINT.

use callsim_server::{app, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Config file path: first CLI argument, then `CALLSIM_CONFIG_PATH`, then
/// `config.toml` beside the binary.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .filter(|arg| !arg.trim().is_empty())
        .or_else(|| std::env::var("CALLSIM_CONFIG_PATH").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "config.toml".to_string())
}

#[tokio::main]
async fn main() {
    let config_path = config_path();
    let config = config::load_config(Some(&config_path))
        .expect("failed to load configuration - the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(path = %config_path, "configuration loaded");

    // Provider credentials are fatal at startup: a harness that cannot
    // place calls or reach the speech providers has nothing to do.
    let missing = config.missing_required();
    if !missing.is_empty() {
        tracing::error!(missing = %missing.join(", "), "missing required configuration");
        tracing::error!("set the variables above (or a config file) and restart");
        std::process::exit(1);
    }

    tracing::info!(
        public_url = %config.server.public_url,
        target = %config.telephony.target_number,
        scenarios = callsim_scenarios::all().len(),
        "configuration validated"
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::from_config(config));
    let app = app(state);

    tracing::info!(%addr, "starting callsim server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address - is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("callsim server shut down");
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM. In-flight calls get to finish
/// their transcript flush before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
