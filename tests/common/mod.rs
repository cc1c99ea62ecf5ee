//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chatbot_runtime::runtime::{InferenceBackend, ModelHandle, RuntimeError, RuntimeSettings};
use chatbot_runtime::{prepare, router, AppState, Settings};

pub const BOUNDARY: &str = "chatbot-test-boundary";

/// Backend that "loads" any existing file and counts resident handles.
#[derive(Default)]
pub struct FakeBackend {
    pub live: Arc<AtomicUsize>,
    pub loads: AtomicUsize,
}

struct FakeHandle {
    live: Arc<AtomicUsize>,
}

impl ModelHandle for FakeHandle {}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InferenceBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn load(
        &self,
        _path: &Path,
        _settings: &RuntimeSettings,
    ) -> Result<Box<dyn ModelHandle>, RuntimeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(now <= 1, "two models resident at once");
        Ok(Box::new(FakeHandle { live: self.live.clone() }))
    }
}

/// Backend whose `load` parks until the test releases it.
pub struct GatedBackend {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

/// Test side of a [`GatedBackend`].
pub struct Gate {
    entered: Mutex<mpsc::Receiver<()>>,
    release: mpsc::Sender<()>,
}

pub fn gated_backend() -> (Arc<GatedBackend>, Arc<Gate>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let backend = GatedBackend {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let gate = Gate { entered: Mutex::new(entered_rx), release: release_tx };
    (Arc::new(backend), Arc::new(gate))
}

impl Gate {
    /// Wait until a load is parked inside the backend.
    pub async fn entered(self: &Arc<Self>) {
        let gate = self.clone();
        tokio::task::spawn_blocking(move || {
            gate.entered.lock().unwrap().recv_timeout(Duration::from_secs(5)).unwrap();
        })
        .await
        .unwrap();
    }

    pub fn release(&self) {
        self.release.send(()).unwrap();
    }
}

impl InferenceBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn load(
        &self,
        _path: &Path,
        _settings: &RuntimeSettings,
    ) -> Result<Box<dyn ModelHandle>, RuntimeError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv_timeout(Duration::from_secs(5)).unwrap();
        Ok(Box::new(FakeHandle { live: Arc::new(AtomicUsize::new(1)) }))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
    pub backend: Arc<FakeBackend>,
    _dir: TempDir,
}

impl TestApp {
    pub fn dir(&self) -> &Path {
        self._dir.path()
    }
}

pub fn repo_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::with_data_dir(dir);
    settings.fixtures_dir = repo_path("fixtures");
    settings.openapi_schema_path = repo_path("openapi/schema.yaml");
    settings.vram_tool = "chatbot-no-such-vram-tool".into();
    settings
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(|_| {})
}

pub fn spawn_app_with(customize: impl FnOnce(&mut Settings)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    customize(&mut settings);
    let backend = Arc::new(FakeBackend::default());
    let state = prepare(settings, backend.clone()).unwrap();
    TestApp { app: router(state.clone()), state, backend, _dir: dir }
}

pub fn spawn_app_with_backend(backend: Arc<dyn InferenceBackend>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = prepare(test_settings(dir.path()), backend).unwrap();
    TestApp {
        app: router(state.clone()),
        state,
        backend: Arc::new(FakeBackend::default()),
        _dir: dir,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    json_request(app, "POST", uri, body).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    json_request(app, "PUT", uri, body).await
}

async fn json_request(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::delete(uri).body(Body::empty()).unwrap()).await
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File { filename: &'a str, content: &'a [u8] },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File { filename, content } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::post("/api/runtime/models/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

/// Upload a small fake GGUF and return its id.
pub async fn upload_model(app: &Router, filename: &str, content: &[u8]) -> i64 {
    let (status, body) = upload(app, &[Part::File { filename, content }]).await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
    body["model"]["id"].as_i64().unwrap()
}
