//! HTTP surface.
//!
//! Every route is nested under the configured API prefix (default `/api`).

mod error;
mod health;
mod mock;
mod runtime;
pub mod schemas;
mod spec;
mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use mock::{CHAT_STREAM_FIXTURE, MODELS_FIXTURE};
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.settings.upload_limit_bytes).unwrap_or(usize::MAX);
    let prefix = state.settings.api_prefix.clone();

    let routes = Router::new()
        .merge(health::routes())
        .merge(mock::routes())
        .merge(runtime::routes(upload_limit))
        .merge(spec::routes())
        .with_state(state);

    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
