//! `/health`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::AppState;
use crate::health::HealthReport;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.report(
        state.shutdown.state(),
        state.runtime.backend_name(),
        state.runtime.state().is_some(),
    ))
}
