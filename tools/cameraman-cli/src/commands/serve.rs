//! Serve the recording API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cameraman_capture_engine::{
    Camera, CameraRegistry, FfmpegLauncher, LifecyclePolicy, RecordingLedger,
    RecordingLifecycleManager, StuckRecordingReaper,
};
use cameraman_common::error::CameramanError;
use cameraman_http_api::{create_router, AppState, StaticTokenVerifier};

pub async fn run(config: Option<PathBuf>, bind: Option<SocketAddr>, verbose: bool) -> anyhow::Result<()> {
    let config = super::load_config(config, verbose)?;

    std::fs::create_dir_all(&config.output_dir).map_err(|source| CameramanError::OutputDir {
        path: config.output_dir.clone(),
        source,
    })?;

    let cameras: Vec<Camera> = config.cameras.iter().cloned().map(Camera::from).collect();
    let registry = Arc::new(CameraRegistry::new(cameras, config.policy.probe_timeout())?);
    let ledger = Arc::new(RecordingLedger::new());
    let launcher = Arc::new(FfmpegLauncher::from_config(&config.capture));

    let manager = RecordingLifecycleManager::new(
        registry,
        ledger,
        launcher,
        LifecyclePolicy::from_config(&config),
    );
    let reaper = StuckRecordingReaper::from_config(manager.clone(), &config.policy).spawn();

    let verifier = Arc::new(StaticTokenVerifier::from_config(&config.auth));
    let app = create_router(AppState::new(manager.clone(), verifier));

    let address = match bind {
        Some(address) => address,
        None => config
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address {}", config.server.bind_address))?,
    };
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    tracing::info!(
        address = %address,
        cameras = config.cameras.len(),
        output_dir = %config.output_dir.display(),
        "Cameraman listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.shutdown().await;
    let stopped = manager.shutdown().await;
    tracing::info!(stopped, "Shutdown complete");

    served.context("HTTP server failed")
}

/// Resolves on ctrl-c or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown requested"),
        () = terminate => tracing::info!(signal = "SIGTERM", "Shutdown requested"),
    }
}
