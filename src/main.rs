//! Aztec Exchange Gateway entrypoint.
//!
//! Wires the configuration resolver, structured logging, the metrics
//! registry, the engine supervisor, and the HTTP router together, then
//! serves until shutdown. Per spec §2 this glue is intentionally thin:
//! the engineering substance lives in [`aztec_gateway::engine`],
//! [`aztec_gateway::api_auth`], and [`aztec_gateway::gateway`].
//!
//! Ported from `original_source/api/app/main.py`'s `lifespan` context
//! manager: start the engine before serving, stop it on shutdown, never
//! let teardown panic.

use std::net::SocketAddr;
use std::sync::Arc;

use aztec_gateway::config::AppConfig;
use aztec_gateway::gateway::build_router;
use aztec_gateway::gateway::state::AppState;
use aztec_gateway::{logging, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(config = %config, "resolved configuration");

    let metrics_handle = metrics::install();

    let state = Arc::new(AppState::new(config.clone(), metrics_handle));

    // ConfigurationError (§7): a missing engine binary is fatal at
    // startup and the process must not start serving HTTP.
    if let Err(err) = state.supervisor.start().await {
        tracing::error!(error = %err, "engine failed to start");
        std::process::exit(1);
    }
    metrics::set_engine_connected(true);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid HOST/PORT: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    let app = build_router(state.clone());

    let serve_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(err) = serve_result {
        tracing::error!(error = %err, "server error");
    }

    tracing::info!("shutting down gateway");
    state.supervisor.stop().await;

    Ok(())
}

/// Resolves once either on Ctrl+C or the process receiving SIGTERM (the
/// signal a container orchestrator sends), whichever comes first.
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
