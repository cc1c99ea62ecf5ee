//! `/runtime/*`: installed models, configuration, and the load lifecycle.

use std::io;
use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tower_http::limit::RequestBodyLimitLayer;

use super::error::ApiError;
use super::schemas::{
    ModelListResponse, ModelResponse, ModelSelectionRequest, RuntimeConfigResponse,
    RuntimeLoadRequest, RuntimeStateResponse,
};
use super::AppState;
use crate::models::{RegistryError, StagedUpload, UploadMetadata};
use crate::runtime::{MemorySnapshot, RuntimeSettings};

pub fn routes(upload_limit: usize) -> Router<AppState> {
    // Own router so the streaming limit applies to uploads only.
    let upload: Router<AppState> = Router::new()
        .route("/runtime/models/upload", post(upload_model))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    Router::new()
        .route("/runtime/models", get(list_models))
        .merge(upload)
        .route("/runtime/models/select", post(select_model))
        .route("/runtime/models/:id", delete(delete_model))
        .route("/runtime/config", get(get_config).put(put_config))
        .route("/runtime/state", get(runtime_state))
        .route("/runtime/load", post(load_model))
        .route("/runtime/unload", post(unload_model))
        .route("/runtime/memory", get(runtime_memory))
}

/// Run SQLite and filesystem work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

async fn list_models(State(state): State<AppState>) -> Result<Json<ModelListResponse>, ApiError> {
    let models = blocking(move || Ok(state.registry().list()?)).await?;
    Ok(Json(ModelListResponse { models }))
}

async fn upload_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ModelResponse>), ApiError> {
    let mut staged: Option<StagedUpload> = None;
    let mut meta = UploadMetadata::default();

    let outcome = read_upload_form(&state, &mut multipart, &mut staged, &mut meta).await;
    let staged = match (outcome, staged) {
        (Ok(()), Some(staged)) => staged,
        (Ok(()), None) => return Err(ApiError::Validation("Field 'file' is required.".into())),
        (Err(e), leftover) => {
            if let Some(leftover) = leftover {
                state.store.discard(leftover).await;
            }
            return Err(e);
        }
    };

    let model = state.store.commit(staged, meta).await?;
    Ok((StatusCode::CREATED, Json(ModelResponse { model })))
}

/// Walk the form. Text fields may arrive before or after the file.
async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
    staged: &mut Option<StagedUpload>,
    meta: &mut UploadMetadata,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if staged.is_some() {
                    return Err(ApiError::BadRequest("Only one file may be uploaded.".into()));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let body = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
                let reader = StreamReader::new(body);
                tokio::pin!(reader);
                *staged = Some(state.store.stage(&filename, reader).await?);
            }
            "display_name" => meta.display_name = optional_text(field.text().await?),
            "quantization" => meta.quantization = optional_text(field.text().await?),
            "context_length" => {
                meta.context_length = parse_field("context_length", field.text().await?)?;
            }
            "parameter_count" => {
                meta.parameter_count = parse_field("parameter_count", field.text().await?)?;
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }
    Ok(())
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_field<T: std::str::FromStr>(name: &str, value: String) -> Result<Option<T>, ApiError> {
    match optional_text(value) {
        None => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("{name} must be a number, got '{text}'"))),
    }
}

async fn select_model(
    State(state): State<AppState>,
    body: Result<Json<ModelSelectionRequest>, JsonRejection>,
) -> Result<Json<ModelResponse>, ApiError> {
    let Json(request) = body?;
    let model = blocking(move || Ok(state.registry().activate(request.model_id)?)).await?;
    tracing::info!(model_id = model.id, slug = %model.slug, "Model selected");
    Ok(Json(ModelResponse { model }))
}

async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ModelResponse>, ApiError> {
    // Under the runtime slot lock: a load cannot pick the file up mid-delete.
    let model = blocking(move || {
        state
            .runtime
            .while_not_resident(id, || Ok::<_, ApiError>(state.store.remove(id)?))
    })
    .await?;
    Ok(Json(ModelResponse { model }))
}

async fn get_config(State(state): State<AppState>) -> Result<Json<RuntimeConfigResponse>, ApiError> {
    let stored = blocking(move || Ok(state.db.load_runtime_config()?)).await?;
    Ok(Json(RuntimeConfigResponse { config: stored.settings }))
}

async fn put_config(
    State(state): State<AppState>,
    body: Result<Json<RuntimeSettings>, JsonRejection>,
) -> Result<Json<RuntimeConfigResponse>, ApiError> {
    let Json(settings) = body?;
    settings.validate()?;
    let stored = blocking(move || Ok(state.db.save_runtime_config(&settings)?)).await?;
    tracing::info!(context_length = stored.settings.context_length, "Runtime configuration updated");
    Ok(Json(RuntimeConfigResponse { config: stored.settings }))
}

async fn runtime_state(State(state): State<AppState>) -> Result<Json<RuntimeStateResponse>, ApiError> {
    let Some(loaded) = state.runtime.state() else {
        return Ok(Json(RuntimeStateResponse::unloaded()));
    };
    let model_id = loaded.model_id;
    // A record removed behind the runtime's back still reports the resident model.
    let model = blocking(move || match state.registry().get(model_id) {
        Ok(model) => Ok(Some(model)),
        Err(RegistryError::NotFound(_)) => {
            tracing::warn!(model_id, "Loaded model has no registry record");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    })
    .await?;
    Ok(Json(RuntimeStateResponse::loaded(model, loaded)))
}

async fn load_model(
    State(state): State<AppState>,
    body: Result<Json<RuntimeLoadRequest>, JsonRejection>,
) -> Result<Json<RuntimeStateResponse>, ApiError> {
    let Json(request) = body?;
    if let Some(config) = &request.config_override {
        config.validate()?;
    }

    let loaded = blocking(move || {
        let model = state.registry().get(request.model_id)?;
        let config = match request.config_override {
            Some(config) => config,
            None => state.db.load_runtime_config()?.settings,
        };
        let path = PathBuf::from(&model.file_path);
        let loaded = state.runtime.load(model.id, &path, config)?;
        match state.registry().mark_loaded(model.id, loaded.loaded_at) {
            Ok(model) => Ok((model, loaded)),
            Err(e) => {
                // Keep the slot and the registry in agreement.
                state.runtime.unload();
                Err(e.into())
            }
        }
    })
    .await?;
    let (model, loaded) = loaded;
    Ok(Json(RuntimeStateResponse::loaded(Some(model), loaded)))
}

async fn unload_model(State(state): State<AppState>) -> Result<Json<RuntimeStateResponse>, ApiError> {
    let cleared = blocking(move || {
        state.runtime.unload();
        Ok(state.registry().deactivate_all()?)
    })
    .await?;
    tracing::debug!(cleared, "Cleared active flags");
    Ok(Json(RuntimeStateResponse::unloaded()))
}

async fn runtime_memory(State(state): State<AppState>) -> Result<Json<MemorySnapshot>, ApiError> {
    let runtime = state.runtime.clone();
    let snapshot = tokio::task::spawn_blocking(move || runtime.memory_snapshot()).await?;
    Ok(Json(snapshot))
}
