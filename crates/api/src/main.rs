use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use docdesk_api::config::ServerConfig;
use docdesk_api::engine::{Orchestrator, OrchestratorConfig};
use docdesk_api::router::build_app_router;
use docdesk_api::state::AppState;
use docdesk_core::params::ParamDefaults;
use docdesk_core::store::MemoryJobStore;
use docdesk_pipeline::JobBodies;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "docdesk_api=debug,docdesk_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = %config.port,
        work_root = %config.work_root.display(),
        output_dir = %config.output_dir.display(),
        "Loaded server configuration"
    );

    // --- Job bodies ---
    let bodies =
        JobBodies::standard(config.harvest.clone()).expect("Failed to build job bodies");

    // --- Orchestrator ---
    let (orchestrator, recorder_handle) = Orchestrator::start(
        Arc::new(MemoryJobStore::new()),
        bodies,
        OrchestratorConfig {
            work_root: config.work_root.clone(),
            output_dir: config.output_dir.clone(),
            param_defaults: ParamDefaults {
                inv_ratio: config.default_inv_ratio,
            },
        },
    );
    tracing::info!("Job orchestrator started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(orchestrator),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Running jobs are not awaited; their records live in memory only.
    recorder_handle.abort();
    let _ = tokio::time::timeout(Duration::from_secs(5), recorder_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
