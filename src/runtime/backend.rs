//! Native inference backends.
//!
//! The lifecycle manager only needs two things from a backend: whether it can
//! run at all, and a way to turn a GGUF path plus settings into a resident
//! handle. Dropping the handle releases its memory.

use std::path::Path;

use super::{RuntimeError, RuntimeSettings};

/// A model resident in memory.
pub trait ModelHandle: Send + Sync {
    /// Bytes of weights held by the handle, when the backend reports it.
    fn size_bytes(&self) -> Option<u64> {
        None
    }
}

pub trait InferenceBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err(RuntimeError::Unavailable)` when loads can never succeed.
    fn check_available(&self) -> Result<(), RuntimeError>;

    /// Construct a handle. Blocks for the duration of the native load.
    fn load(
        &self,
        path: &Path,
        settings: &RuntimeSettings,
    ) -> Result<Box<dyn ModelHandle>, RuntimeError>;
}

/// Backend for builds without a native engine. Every load is refused.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Default for UnavailableBackend {
    fn default() -> Self {
        Self::new("built without the `gguf` feature")
    }
}

impl InferenceBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable(self.reason.clone()))
    }

    fn load(
        &self,
        _path: &Path,
        _settings: &RuntimeSettings,
    ) -> Result<Box<dyn ModelHandle>, RuntimeError> {
        Err(RuntimeError::Unavailable(self.reason.clone()))
    }
}

/// The backend compiled into this binary.
pub fn default_backend() -> std::sync::Arc<dyn InferenceBackend> {
    #[cfg(feature = "gguf")]
    {
        std::sync::Arc::new(llama::LlamaCppBackend::new())
    }
    #[cfg(not(feature = "gguf"))]
    {
        std::sync::Arc::new(UnavailableBackend::default())
    }
}

#[cfg(feature = "gguf")]
pub use llama::LlamaCppBackend;

#[cfg(feature = "gguf")]
mod llama {
    use std::num::NonZeroU32;
    use std::path::Path;
    use std::sync::OnceLock;

    use llama_cpp_2::context::params::LlamaContextParams;
    use llama_cpp_2::llama_backend::LlamaBackend;
    use llama_cpp_2::model::params::LlamaModelParams;
    use llama_cpp_2::model::LlamaModel;

    use super::{InferenceBackend, ModelHandle};
    use crate::runtime::{RuntimeError, RuntimeSettings};

    /// llama.cpp via `llama-cpp-2`.
    ///
    /// `LlamaBackend::init` may only succeed once per process, so the result
    /// is cached and shared by every load.
    pub struct LlamaCppBackend {
        backend: OnceLock<Result<LlamaBackend, String>>,
    }

    impl LlamaCppBackend {
        pub fn new() -> Self {
            Self { backend: OnceLock::new() }
        }

        fn backend(&self) -> Result<&LlamaBackend, RuntimeError> {
            self.backend
                .get_or_init(|| LlamaBackend::init().map_err(|e| e.to_string()))
                .as_ref()
                .map_err(|e| RuntimeError::Unavailable(format!("backend init: {e}")))
        }
    }

    impl Default for LlamaCppBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    // SAFETY: LlamaBackend is a process-wide token with no interior state.
    unsafe impl Send for LlamaCppBackend {}
    unsafe impl Sync for LlamaCppBackend {}

    struct LlamaHandle {
        model: LlamaModel,
    }

    // SAFETY: LlamaModel is Send+Sync in llama-cpp-2.
    unsafe impl Send for LlamaHandle {}
    unsafe impl Sync for LlamaHandle {}

    impl ModelHandle for LlamaHandle {
        fn size_bytes(&self) -> Option<u64> {
            Some(self.model.size())
        }
    }

    impl InferenceBackend for LlamaCppBackend {
        fn name(&self) -> &'static str {
            "llama.cpp"
        }

        fn check_available(&self) -> Result<(), RuntimeError> {
            self.backend().map(|_| ())
        }

        fn load(
            &self,
            path: &Path,
            settings: &RuntimeSettings,
        ) -> Result<Box<dyn ModelHandle>, RuntimeError> {
            let backend = self.backend()?;

            // Leave the layer count at the library default when unset; zero
            // means "CPU only" to llama.cpp.
            let mut model_params =
                LlamaModelParams::default().with_use_mlock(settings.keep_in_memory);
            if let Some(layers) = settings.gpu_layers {
                model_params = model_params.with_n_gpu_layers(layers);
            }
            if !settings.use_mmap {
                tracing::warn!("use_mmap=false is not supported by this backend, mapping anyway");
            }

            let model = LlamaModel::load_from_file(backend, path, &model_params)
                .map_err(|e| RuntimeError::Backend(format!("load: {e}")))?;

            // Build one context up front so an impossible context size fails
            // the load instead of the first prompt.
            let threads = i32::try_from(settings.cpu_threads).unwrap_or(i32::MAX);
            let ctx_params = LlamaContextParams::default()
                .with_n_ctx(NonZeroU32::new(settings.context_length))
                .with_n_batch(settings.eval_batch_size)
                .with_n_threads(threads)
                .with_n_threads_batch(threads);
            drop(
                model
                    .new_context(backend, ctx_params)
                    .map_err(|e| RuntimeError::Backend(format!("context: {e}")))?,
            );

            Ok(Box::new(LlamaHandle { model }))
        }
    }
}
