use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use taskboard::config::LogFormat;
use taskboard::storage::Repositories;
use taskboard::{AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Initialize logging. `RUST_LOG` wins over the configured default level.
fn init_tracing(default_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Console => builder.init(),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration; logging falls back to defaults if it is invalid
    let config = match Config::from_env() {
        Ok(config) => {
            init_tracing(&config.log_level, config.log_format);
            config
        }
        Err(e) => {
            init_tracing("info", LogFormat::Console);
            error!("Configuration error: {e}");
            return Err(exitcode::CONFIG);
        }
    };

    info!("Starting Taskboard API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.host,
        port = %config.port,
        auth_enabled = config.auth_enabled,
        rate_limit_enabled = config.rate_limiting_enabled(),
        docs_enabled = config.docs_enabled,
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    } else {
        info!("Prometheus metrics disabled (METRICS_PORT=0)");
    }

    if config.auth_enabled && config.auth_issuer.is_none() {
        warn!("AUTH_ISSUER is not set, token issuers will not be checked");
    }

    // Build application state and router
    let state = AppState::new(config.clone(), Repositories::in_memory()).map_err(|e| {
        error!("Failed to build application state: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET    /health                        - Health check");
    info!("  GET    /ready                         - Readiness check");
    info!("  GET    /api/v1/projects               - List projects");
    info!("  POST   /api/v1/projects               - Create project");
    info!("  GET    /api/v1/projects/{{id}}          - Get project");
    info!("  PUT    /api/v1/projects/{{id}}          - Update project");
    info!("  DELETE /api/v1/projects/{{id}}          - Delete project");
    info!("  GET    /api/v1/projects/{{id}}/tasks    - List project tasks");
    info!("  POST   /api/v1/projects/{{id}}/tasks    - Create task");
    info!("  GET    /api/v1/tasks/{{id}}             - Get task");
    info!("  PUT    /api/v1/tasks/{{id}}             - Update task");
    info!("  DELETE /api/v1/tasks/{{id}}             - Delete task");

    // /ready reports 503 as soon as the signal arrives, while requests drain
    let signal_state = state.clone();
    let shutdown = async move {
        utils::shutdown_signal().await;
        signal_state.begin_shutdown();
    };

    // Peer addresses feed the rate limiter and access log
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    // Gracefully shutdown background tasks
    info!("HTTP server stopped, shutting down background tasks...");
    if tokio::time::timeout(config.shutdown_timeout, state.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.shutdown_timeout.as_secs(),
            "Background tasks did not stop within the shutdown timeout"
        );
    }

    info!("Server shutdown complete");
    Ok(())
}
