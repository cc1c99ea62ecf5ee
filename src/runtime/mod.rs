//! Single-model runtime: settings, backend seam, lifecycle manager, memory probe.

mod backend;
mod error;
mod manager;
mod memory;
mod settings;

#[cfg(feature = "gguf")]
pub use backend::LlamaCppBackend;
pub use backend::{default_backend, InferenceBackend, ModelHandle, UnavailableBackend};
pub use error::RuntimeError;
pub use manager::{LoadedModelState, RuntimeManager};
pub use memory::{parse_used_vram, MemoryProbe, MemorySnapshot, DEFAULT_VRAM_TOOL, FALLBACK_SOURCE};
pub use settings::{
    KvCachePlacement, RuntimeSettings, SettingsError, CONTEXT_LENGTH_RANGE, CPU_THREADS_RANGE,
    EVAL_BATCH_SIZE_RANGE,
};
