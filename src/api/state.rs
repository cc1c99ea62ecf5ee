//! Shared handler state.

use std::sync::Arc;

use crate::config::Settings;
use crate::db::{Database, DbError};
use crate::health::HealthChecker;
use crate::models::{ModelRegistry, ModelStore};
use crate::runtime::{InferenceBackend, MemoryProbe, RuntimeManager};
use crate::shutdown::ShutdownCoordinator;

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: Arc<Database>,
    pub store: ModelStore,
    pub runtime: Arc<RuntimeManager>,
    pub health: Arc<HealthChecker>,
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    /// Open the database at `settings.database_path` and wire the components.
    pub fn open(settings: Settings, backend: Arc<dyn InferenceBackend>) -> Result<Self, DbError> {
        let db = Arc::new(Database::open(&settings.database_path)?);
        Ok(Self::with_database(settings, db, backend))
    }

    pub fn with_database(
        settings: Settings,
        db: Arc<Database>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        let registry = ModelRegistry::new(db.clone());
        let store = ModelStore::new(registry, settings.models_dir.clone());
        let runtime = Arc::new(RuntimeManager::new(
            backend,
            MemoryProbe::new(settings.vram_tool.clone()),
        ));
        let health = Arc::new(HealthChecker::new(settings.project_name.clone()));
        Self {
            settings: Arc::new(settings),
            db,
            store,
            runtime,
            health,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.store.registry()
    }
}
