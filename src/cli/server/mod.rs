//! HTTP server exposing the pipeline (feature `server`).

pub mod handlers;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};

use crate::service::SkillService;

use handlers::AppState;

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/skills", post(handlers::create_skill))
        .route("/jobs/{id}", get(handlers::job_status))
        .route("/jobs/{id}/prompt", get(handlers::peek_prompt))
        .route("/jobs/{id}/respond", post(handlers::submit_response))
        .route("/jobs/{id}/cancel", post(handlers::cancel_job))
        .route("/config/keywords", get(handlers::keyword_config))
        .route("/taxonomy/export", get(handlers::export_taxonomy))
        .with_state(state)
}

/// Serve the API until ctrl-c (or shutdown-token cancellation).
pub async fn serve(service: Arc<SkillService>, port: u16) -> Result<()> {
    let (state, shutdown_token) = AppState::new(service);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    let addr = listener.local_addr()?;
    tracing::info!("server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_token.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            tracing::info!("server shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
