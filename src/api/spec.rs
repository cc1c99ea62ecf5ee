//! `/spec`: the OpenAPI document as shipped.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use super::error::ApiError;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/spec", get(openapi_schema))
}

async fn openapi_schema(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let path = &state.settings.openapi_schema_path;
    let body = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::Internal("OpenAPI schema not found.".to_string())
        } else {
            ApiError::Internal(format!("OpenAPI schema unreadable: {e}"))
        }
    })?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], body))
}
