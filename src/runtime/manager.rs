//! Runtime lifecycle manager.
//!
//! Holds at most one resident model. `load`, `unload` and
//! [`while_not_resident`](RuntimeManager::while_not_resident) share one slot
//! lock, so callers never see a half-swapped slot. The old handle is dropped
//! before the new one is built; two handles are never alive at once.
//!
//! The slot lock is held for the whole native load. `state` reads a published
//! copy that is only written under the slot lock, so it never waits on a load
//! in progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};

use super::backend::{InferenceBackend, ModelHandle};
use super::memory::{MemoryProbe, MemorySnapshot};
use super::{RuntimeError, RuntimeSettings};
use crate::telemetry;

/// What is resident, with the settings it was loaded under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModelState {
    pub model_id: i64,
    pub model_path: PathBuf,
    pub config: RuntimeSettings,
    pub loaded_at: DateTime<Utc>,
}

enum Slot {
    Unloaded,
    Loaded {
        handle: Box<dyn ModelHandle>,
        state: LoadedModelState,
    },
}

pub struct RuntimeManager {
    backend: Arc<dyn InferenceBackend>,
    probe: MemoryProbe,
    slot: Mutex<Slot>,
    published: RwLock<Option<LoadedModelState>>,
}

impl RuntimeManager {
    pub fn new(backend: Arc<dyn InferenceBackend>, probe: MemoryProbe) -> Self {
        Self {
            backend,
            probe,
            slot: Mutex::new(Slot::Unloaded),
            published: RwLock::new(None),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Replace whatever is resident with `path`.
    ///
    /// Availability and file existence are checked first; failing either
    /// leaves the current model untouched. If the native load itself fails
    /// the previous model is already gone and the slot stays empty.
    pub fn load(
        &self,
        model_id: i64,
        path: &Path,
        config: RuntimeSettings,
    ) -> Result<LoadedModelState, RuntimeError> {
        let result = self.load_inner(model_id, path, config);
        let outcome = match &result {
            Ok(_) => "success",
            Err(RuntimeError::Unavailable(_)) => "unavailable",
            Err(RuntimeError::NotFound(_)) => "not_found",
            Err(RuntimeError::Backend(_) | RuntimeError::Resident(_)) => "error",
        };
        telemetry::record_model_load(outcome);
        result
    }

    fn load_inner(
        &self,
        model_id: i64,
        path: &Path,
        config: RuntimeSettings,
    ) -> Result<LoadedModelState, RuntimeError> {
        self.backend.check_available()?;

        let mut slot = self.slot.lock();
        // Checked under the lock so a guarded delete cannot remove the file
        // between the check and the load.
        if !path.is_file() {
            return Err(RuntimeError::NotFound(path.to_path_buf()));
        }
        if let Slot::Loaded { state, .. } = self.take_slot(&mut slot) {
            tracing::info!(model_id = state.model_id, "Releasing resident model");
        }

        let started = Instant::now();
        let handle = self.backend.load(path, &config).map_err(|e| {
            tracing::error!(model_id, path = %path.display(), error = %e, "Model load failed");
            e
        })?;
        let elapsed = started.elapsed();
        telemetry::record_load_duration(elapsed);

        let state = LoadedModelState {
            model_id,
            model_path: path.to_path_buf(),
            config,
            loaded_at: Utc::now(),
        };
        tracing::info!(
            model_id,
            path = %path.display(),
            backend = self.backend.name(),
            size_bytes = handle.size_bytes(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Model loaded"
        );
        *slot = Slot::Loaded { handle, state: state.clone() };
        *self.published.write() = Some(state.clone());
        Ok(state)
    }

    /// Drop the resident model, if any. Returns whether one was resident.
    pub fn unload(&self) -> bool {
        let mut slot = self.slot.lock();
        match self.take_slot(&mut slot) {
            Slot::Loaded { state, handle } => {
                // Release under the lock so a concurrent load cannot overlap.
                drop(handle);
                telemetry::record_model_unload();
                tracing::info!(model_id = state.model_id, "Model unloaded");
                true
            }
            Slot::Unloaded => false,
        }
    }

    /// Run `f` with the slot locked, unless `model_id` is resident.
    ///
    /// No load can start or finish while `f` runs. Blocks behind a load in
    /// progress.
    pub fn while_not_resident<T, E, F>(&self, model_id: i64, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RuntimeError>,
    {
        let slot = self.slot.lock();
        if matches!(&*slot, Slot::Loaded { state, .. } if state.model_id == model_id) {
            return Err(RuntimeError::Resident(model_id).into());
        }
        f()
    }

    /// Last published state. Does not wait on a load in progress.
    pub fn state(&self) -> Option<LoadedModelState> {
        self.published.read().clone()
    }

    /// Does not take the slot lock.
    pub fn memory_snapshot(&self) -> MemorySnapshot {
        self.probe.snapshot()
    }

    fn take_slot(&self, slot: &mut MutexGuard<'_, Slot>) -> Slot {
        *self.published.write() = None;
        std::mem::replace(&mut **slot, Slot::Unloaded)
    }
}
