//! HTTP tests for `/runtime/*` configuration and lifecycle routes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use chatbot_runtime::runtime::UnavailableBackend;
use common::*;

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_config_defaults_before_first_write() {
    let t = spawn_app();
    let (status, body) = get(&t.app, "/api/runtime/config").await;
    assert_eq!(status, StatusCode::OK);
    let config = &body["config"];
    assert_eq!(config["context_length"], 4096);
    assert!(config["gpu_layers"].is_null());
    assert_eq!(config["cpu_threads"], 8);
    assert_eq!(config["eval_batch_size"], 128);
    assert_eq!(config["kv_cache_placement"], "auto");
    assert_eq!(config["use_mmap"], true);
    assert_eq!(config["keep_in_memory"], true);
}

#[tokio::test]
async fn test_config_put_then_get() {
    let t = spawn_app();
    let update = json!({
        "context_length": 8192,
        "gpu_layers": 24,
        "cpu_threads": 6,
        "eval_batch_size": 64,
        "kv_cache_placement": "gpu",
        "use_mmap": false,
        "keep_in_memory": false
    });
    let (status, body) = put_json(&t.app, "/api/runtime/config", update.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"], update);

    let (status, body) = get(&t.app, "/api/runtime/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"], update);
}

#[tokio::test]
async fn test_config_out_of_range_rejected() {
    let t = spawn_app();
    let (status, body) =
        put_json(&t.app, "/api/runtime/config", json!({ "context_length": 100 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
    assert!(body["detail"].as_str().unwrap().contains("context_length"));

    // Nothing was persisted.
    let (_, body) = get(&t.app, "/api/runtime/config").await;
    assert_eq!(body["config"]["context_length"], 4096);
}

#[tokio::test]
async fn test_config_unknown_placement_rejected() {
    let t = spawn_app();
    let (status, _) =
        put_json(&t.app, "/api/runtime/config", json!({ "kv_cache_placement": "disk" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Load / unload lifecycle
// ============================================================================

#[tokio::test]
async fn test_state_starts_unloaded() {
    let t = spawn_app();
    let (status, body) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], false);
    assert!(body["model"].is_null());
    assert!(body["config"].is_null());
    assert!(body["runtime_path"].is_null());
    assert!(body["loaded_at"].is_null());
}

#[tokio::test]
async fn test_load_unknown_model_is_404() {
    let t = spawn_app();
    let (status, body) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": 999 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Model not found.");
}

#[tokio::test]
async fn test_load_reports_state_and_marks_active() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let (status, body) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": id })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["loaded"], true);
    assert_eq!(body["model"]["id"], id);
    assert_eq!(body["model"]["is_active"], true);
    assert!(!body["model"]["last_loaded_at"].is_null());
    assert_eq!(body["config"]["context_length"], 4096);
    let runtime_path = body["runtime_path"].as_str().unwrap();
    assert_eq!(std::path::Path::new(runtime_path), t.state.settings.models_dir);

    let (_, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(state["loaded"], true);
    assert_eq!(state["model"]["id"], id);
}

#[tokio::test]
async fn test_load_uses_stored_config() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;
    put_json(&t.app, "/api/runtime/config", json!({ "context_length": 2048 })).await;

    let (_, body) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": id })).await;
    assert_eq!(body["config"]["context_length"], 2048);
}

#[tokio::test]
async fn test_load_override_is_not_persisted() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let request = json!({ "model_id": id, "config_override": { "context_length": 1024 } });
    let (status, body) = post_json(&t.app, "/api/runtime/load", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["context_length"], 1024);

    let (_, stored) = get(&t.app, "/api/runtime/config").await;
    assert_eq!(stored["config"]["context_length"], 4096);
}

#[tokio::test]
async fn test_load_invalid_override_rejected() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let request = json!({ "model_id": id, "config_override": { "cpu_threads": 0 } });
    let (status, _) = post_json(&t.app, "/api/runtime/load", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(t.backend.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_loading_second_model_replaces_first() {
    let t = spawn_app();
    let a = upload_model(&t.app, "alpha.gguf", b"GGUF-A").await;
    let b = upload_model(&t.app, "beta.gguf", b"GGUF-B").await;

    post_json(&t.app, "/api/runtime/load", json!({ "model_id": a })).await;
    let (status, body) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": b })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"]["id"], b);

    assert_eq!(t.backend.live.load(Ordering::SeqCst), 1);
    assert_eq!(t.backend.loads.load(Ordering::SeqCst), 2);

    let (_, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(state["model"]["id"], b);

    let (_, list) = get(&t.app, "/api/runtime/models").await;
    let active: Vec<_> = list["models"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["is_active"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], b);
}

#[tokio::test]
async fn test_missing_file_keeps_previous_model() {
    let t = spawn_app();
    let a = upload_model(&t.app, "alpha.gguf", b"GGUF-A").await;
    let b = upload_model(&t.app, "beta.gguf", b"GGUF-B").await;
    post_json(&t.app, "/api/runtime/load", json!({ "model_id": a })).await;

    let path = t.state.registry().get(b).unwrap().file_path;
    std::fs::remove_file(path).unwrap();

    let (status, _) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": b })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(state["loaded"], true);
    assert_eq!(state["model"]["id"], a);
    assert_eq!(t.backend.live.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unavailable_backend_is_500() {
    let t = spawn_app_with_backend(Arc::new(UnavailableBackend::default()));
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let (status, body) = post_json(&t.app, "/api/runtime/load", json!({ "model_id": id })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "runtime_unavailable");

    let (_, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(state["loaded"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reads_do_not_wait_on_load_in_progress() {
    let (backend, gate) = gated_backend();
    let t = spawn_app_with_backend(backend);
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let app = t.app.clone();
    let load = tokio::spawn(async move {
        post_json(&app, "/api/runtime/load", json!({ "model_id": id })).await
    });
    gate.entered().await;

    let (status, health) = tokio::time::timeout(Duration::from_millis(500), get(&t.app, "/api/health"))
        .await
        .expect("health waited on the load");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["model_loaded"], false);

    let (status, state) =
        tokio::time::timeout(Duration::from_millis(500), get(&t.app, "/api/runtime/state"))
            .await
            .expect("state waited on the load");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["loaded"], false);

    gate.release();
    let (status, body) = load.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"]["id"], id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_waits_for_load_then_conflicts() {
    let (backend, gate) = gated_backend();
    let t = spawn_app_with_backend(backend);
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;

    let app = t.app.clone();
    let load = tokio::spawn(async move {
        post_json(&app, "/api/runtime/load", json!({ "model_id": id })).await
    });
    gate.entered().await;

    let app = t.app.clone();
    let uri = format!("/api/runtime/models/{id}");
    let removal = tokio::spawn(async move { delete(&app, &uri).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!removal.is_finished());

    gate.release();
    assert_eq!(load.await.unwrap().0, StatusCode::OK);
    let (status, body) = removal.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let path = t.state.registry().get(id).unwrap().file_path;
    assert!(std::path::Path::new(&path).is_file());
}

#[tokio::test]
async fn test_state_survives_missing_record() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;
    post_json(&t.app, "/api/runtime/load", json!({ "model_id": id })).await;

    t.state.registry().delete(id).unwrap();

    let (status, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["loaded"], true);
    assert!(state["model"].is_null());
    assert!(state["config"].is_object());
    assert!(state["loaded_at"].is_string());
}

#[tokio::test]
async fn test_unload_releases_and_clears_active() {
    let t = spawn_app();
    let id = upload_model(&t.app, "tiny.gguf", b"GGUFTEST").await;
    post_json(&t.app, "/api/runtime/load", json!({ "model_id": id })).await;

    let (status, body) = post_json(&t.app, "/api/runtime/unload", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], false);
    assert_eq!(t.backend.live.load(Ordering::SeqCst), 0);
    assert!(t.state.registry().active().unwrap().is_none());

    let (_, state) = get(&t.app, "/api/runtime/state").await;
    assert_eq!(state["loaded"], false);
}

#[tokio::test]
async fn test_unload_when_nothing_loaded() {
    let t = spawn_app();
    let (status, body) = post_json(&t.app, "/api/runtime/unload", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], false);
}

// ============================================================================
// Memory
// ============================================================================

#[tokio::test]
async fn test_memory_without_vram_tool() {
    let t = spawn_app();
    let (status, body) = get(&t.app, "/api/runtime/memory").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["vram_bytes"].is_null());
    assert_eq!(body["source"], "sysinfo");
    assert!(body["resident_bytes"].as_u64().is_some());
}
