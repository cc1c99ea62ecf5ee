//! Chatbot Runtime
//!
//! Local GGUF model registry plus a single-model inference runtime, served
//! over a small HTTP API.
//!
//! # Components
//!
//! - **models**: uploads, checksums, slug assignment, and the installed-model
//!   registry (at most one active record)
//! - **runtime**: the lifecycle manager holding at most one resident model,
//!   its settings, and memory reporting
//! - **db**: SQLite storage for models and the runtime configuration
//! - **api**: axum routes under the configured prefix
//!
//! Real inference is delegated to llama.cpp behind the `gguf` feature. Without
//! it every load reports the runtime as unavailable and everything else works.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod health;
pub mod models;
pub mod runtime;
pub mod server;
pub mod shutdown;
pub mod telemetry;

pub use api::{router, AppState};
pub use config::Settings;
pub use server::{prepare, run, ServerError};

/// Crate version reported by `/health` and `version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
