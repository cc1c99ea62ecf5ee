//! Metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder every call here is a no-op.

use std::time::Duration;

pub const MODEL_LOADS: &str = "chatbot_model_loads_total";
pub const MODEL_UNLOADS: &str = "chatbot_model_unloads_total";
pub const MODEL_UPLOADS: &str = "chatbot_model_uploads_total";
pub const UPLOAD_BYTES: &str = "chatbot_upload_bytes_total";
pub const LOAD_SECONDS: &str = "chatbot_model_load_seconds";

/// Register descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    metrics::describe_counter!(MODEL_LOADS, "Model load attempts by outcome");
    metrics::describe_counter!(MODEL_UNLOADS, "Resident models released");
    metrics::describe_counter!(MODEL_UPLOADS, "Models installed via upload");
    metrics::describe_counter!(UPLOAD_BYTES, metrics::Unit::Bytes, "Bytes written by uploads");
    metrics::describe_histogram!(LOAD_SECONDS, metrics::Unit::Seconds, "Native model load time");
}

pub fn record_model_load(outcome: &'static str) {
    metrics::counter!(MODEL_LOADS, "outcome" => outcome).increment(1);
}

pub fn record_load_duration(elapsed: Duration) {
    metrics::histogram!(LOAD_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_model_unload() {
    metrics::counter!(MODEL_UNLOADS).increment(1);
}

pub fn record_model_upload(bytes: u64) {
    metrics::counter!(MODEL_UPLOADS).increment(1);
    metrics::counter!(UPLOAD_BYTES).increment(bytes);
}
