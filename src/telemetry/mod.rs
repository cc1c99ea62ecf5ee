//! Structured logging and metrics.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    describe_metrics, record_load_duration, record_model_load, record_model_unload,
    record_model_upload,
};
