//! `/mock/*`: canned catalogue and chat stream read from the fixtures directory.

use std::path::Path;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::schemas::{ChatChunk, ChatRequest, ChatResponse, ModelCard};
use super::AppState;

pub const MODELS_FIXTURE: &str = "models.json";
pub const CHAT_STREAM_FIXTURE: &str = "chat_stream.json";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mock/models", get(list_models))
        .route("/mock/chat", post(create_chat))
}

async fn read_fixture<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, ApiError> {
    let path = dir.join(name);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::Internal(format!("Fixture '{name}' not found.")));
        }
        Err(e) => return Err(ApiError::Internal(format!("Fixture '{name}' unreadable: {e}"))),
    };
    serde_json::from_str(&raw)
        .map_err(|e| ApiError::Internal(format!("Fixture '{name}' is invalid: {e}")))
}

async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelCard>>, ApiError> {
    let models = read_fixture(&state.settings.fixtures_dir, MODELS_FIXTURE).await?;
    Ok(Json(models))
}

async fn create_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body?;
    request.validate().map_err(ApiError::Validation)?;

    let dir = &state.settings.fixtures_dir;
    let stream: Vec<ChatChunk> = read_fixture(dir, CHAT_STREAM_FIXTURE).await?;
    let models: Vec<ModelCard> = read_fixture(dir, MODELS_FIXTURE).await?;
    if !models.iter().any(|m| m.id == request.model_id) {
        return Err(ApiError::NotFound(format!("Unknown model_id '{}'.", request.model_id)));
    }

    Ok(Json(ChatResponse { model_id: request.model_id, stream }))
}
