//! Inference configuration applied when a model is loaded.
//!
//! All fields have safe defaults. Values are validated before they are
//! persisted or handed to the backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONTEXT_LENGTH_RANGE: (u32, u32) = (256, 32_768);
pub const CPU_THREADS_RANGE: (u32, u32) = (1, 128);
pub const EVAL_BATCH_SIZE_RANGE: (u32, u32) = (1, 4096);

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("unknown kv_cache_placement '{0}' (expected auto, cpu, gpu or hybrid)")]
    UnknownPlacement(String),
}

/// Preferred memory tier for the KV cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvCachePlacement {
    #[default]
    Auto,
    Cpu,
    Gpu,
    Hybrid,
}

impl KvCachePlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for KvCachePlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KvCachePlacement {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(SettingsError::UnknownPlacement(other.to_string())),
        }
    }
}

/// Runtime configuration shared across models.
///
/// Missing fields in a request body take their defaults, so a `PUT` always
/// replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Context window size in tokens.
    pub context_length: u32,
    /// Transformer layers offloaded to the GPU. `None` leaves the choice to
    /// the backend, which is not the same as `Some(0)`.
    pub gpu_layers: Option<u32>,
    pub cpu_threads: u32,
    pub eval_batch_size: u32,
    pub kv_cache_placement: KvCachePlacement,
    pub use_mmap: bool,
    /// Keep tensors resident between prompts.
    pub keep_in_memory: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            context_length: 4096,
            gpu_layers: None,
            cpu_threads: 8,
            eval_batch_size: 128,
            kv_cache_placement: KvCachePlacement::Auto,
            use_mmap: true,
            keep_in_memory: true,
        }
    }
}

impl RuntimeSettings {
    /// Validate bounds. Returns the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("context_length", self.context_length, CONTEXT_LENGTH_RANGE)?;
        check_range("cpu_threads", self.cpu_threads, CPU_THREADS_RANGE)?;
        check_range("eval_batch_size", self.eval_batch_size, EVAL_BATCH_SIZE_RANGE)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange { field, value, min, max });
    }
    Ok(())
}
