//! Server bootstrap: directories, database, optional reconciliation, serve
//! until a shutdown signal, then release the resident model.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::api::{self, AppState};
use crate::config::Settings;
use crate::db::DbError;
use crate::models::RegistryError;
use crate::runtime::InferenceBackend;
use crate::shutdown;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to prepare state directories: {0}")]
    Directories(#[source] io::Error),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Startup reconciliation failed: {0}")]
    Reconcile(#[from] RegistryError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

/// Open state and prepare the application without binding a socket.
pub fn prepare(settings: Settings, backend: Arc<dyn InferenceBackend>) -> Result<AppState, ServerError> {
    settings.ensure_directories().map_err(ServerError::Directories)?;
    let reconcile = settings.reconcile_on_startup;
    let state = AppState::open(settings, backend)?;

    // Nothing is resident after a restart, so any active flag is stale.
    if reconcile {
        let cleared = state.registry().deactivate_all()?;
        tracing::info!(cleared, "Startup reconciliation cleared stale active flags");
    }
    Ok(state)
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn run(settings: Settings, backend: Arc<dyn InferenceBackend>) -> Result<(), ServerError> {
    let addr = settings.bind_address();
    let state = prepare(settings, backend)?;
    let app = api::router(state.clone());

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    tracing::info!(
        addr = %addr,
        prefix = %state.settings.api_prefix,
        backend = state.runtime.backend_name(),
        version = crate::VERSION,
        "Server listening"
    );

    let coordinator = state.shutdown.clone();
    tokio::spawn(async move {
        shutdown::wait_for_signal().await;
        coordinator.trigger();
    });

    let draining = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { draining.wait().await })
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Connections drained, releasing runtime");
    let runtime = state.runtime.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || runtime.unload()).await {
        tracing::error!(error = %e, "Unload during shutdown failed");
    }
    state.shutdown.mark_stopped();
    tracing::info!("Shutdown complete");
    Ok(())
}
