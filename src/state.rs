//! Service State
//!
//! Shared state of the service, containing all long-lived components.
//! Built once by `initialize` and handed out as cheap clones.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::models::settings::{ConfigUpdate, ServiceConfig};
use crate::services::executor::AnalysisExecutor;
use crate::services::lifecycle::AnalysisCoordinator;
use crate::services::loader::FileDatasetLoader;
use crate::services::recommendations::RecommendationEngine;
use crate::services::registry::CapabilityRegistry;
use crate::services::resolver::CapabilityResolver;
use crate::storage::{ConfigService, Database, SqliteResultStore};
use crate::utils::error::{AppError, AppResult};

/// Service state shared by the CLI and background tasks
pub struct ServiceState {
    /// SQLite database with connection pool
    database: Arc<RwLock<Option<Database>>>,
    /// Configuration service for service settings
    config: Arc<RwLock<Option<ConfigService>>>,
    /// Immutable capability catalog
    registry: Arc<RwLock<Option<Arc<CapabilityRegistry>>>>,
    /// Lifecycle coordinator wired to the database
    coordinator: Arc<RwLock<Option<AnalysisCoordinator>>>,
    /// Whether the state has been initialized
    initialized: Arc<RwLock<bool>>,
}

impl ServiceState {
    /// Create a new uninitialized state
    pub fn new() -> Self {
        Self {
            database: Arc::new(RwLock::new(None)),
            config: Arc::new(RwLock::new(None)),
            registry: Arc::new(RwLock::new(None)),
            coordinator: Arc::new(RwLock::new(None)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize all services from the default configuration file
    pub async fn initialize(&self) -> AppResult<()> {
        self.initialize_with(ConfigService::new()?).await
    }

    /// Initialize all services from an already loaded configuration
    pub async fn initialize_with(&self, config_service: ConfigService) -> AppResult<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        let config = config_service.get_config_clone();

        // Initialize database
        let db = Database::open(&config.resolved_database_path()?)?;

        // Build the analysis pipeline
        let registry = Arc::new(CapabilityRegistry::builtin()?);
        let resolver = Arc::new(CapabilityResolver::builtin(
            Arc::clone(&registry),
            config.fallback_seed,
        ));
        let executor = Arc::new(AnalysisExecutor::new(
            resolver,
            Arc::new(FileDatasetLoader::new()),
        ));
        let engine = Arc::new(RecommendationEngine::builtin(Arc::clone(&registry)));
        let store = Arc::new(SqliteResultStore::new(
            db.clone(),
            config.resolved_storage_root()?,
        ));
        let coordinator = AnalysisCoordinator::new(
            executor,
            engine,
            store,
            config.resolved_staging_dir()?,
        )
        .with_timeout(config.execution_timeout_secs.map(Duration::from_secs));

        *self.database.write().await = Some(db);
        *self.config.write().await = Some(config_service);
        *self.registry.write().await = Some(registry);
        *self.coordinator.write().await = Some(coordinator);

        info!("Service state initialized");
        *initialized = true;
        Ok(())
    }

    /// Check if database is healthy
    pub fn is_database_healthy(&self) -> bool {
        // Use try_read to avoid blocking
        if let Ok(guard) = self.database.try_read() {
            if let Some(ref db) = *guard {
                return db.is_healthy();
            }
        }
        false
    }

    /// Get the current configuration
    pub async fn get_config(&self) -> AppResult<ServiceConfig> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.get_config_clone()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Update the configuration. Pipeline settings apply after restart.
    pub async fn update_config(&self, update: ConfigUpdate) -> AppResult<ServiceConfig> {
        let mut guard = self.config.write().await;
        match &mut *guard {
            Some(config) => config.update_config(update),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Get the capability registry
    pub async fn registry(&self) -> AppResult<Arc<CapabilityRegistry>> {
        let guard = self.registry.read().await;
        match &*guard {
            Some(registry) => Ok(Arc::clone(registry)),
            None => Err(AppError::internal("Capability registry not initialized")),
        }
    }

    /// Get the lifecycle coordinator
    pub async fn coordinator(&self) -> AppResult<AnalysisCoordinator> {
        let guard = self.coordinator.read().await;
        match &*guard {
            Some(coordinator) => Ok(coordinator.clone()),
            None => Err(AppError::internal("Analysis coordinator not initialized")),
        }
    }

    /// Get database access for direct queries
    pub async fn with_database<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Database) -> AppResult<T>,
    {
        let guard = self.database.read().await;
        match &*guard {
            Some(db) => f(db),
            None => Err(AppError::database("Database not initialized")),
        }
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn initialized_state(dir: &std::path::Path) -> ServiceState {
        let mut config = ConfigService::with_path(dir.join("config.json")).unwrap();
        config
            .update_config(ConfigUpdate {
                database_path: Some(dir.join("analysis.db")),
                staging_dir: Some(dir.join("staging")),
                storage_root: Some(dir.join("files")),
                fallback_seed: Some(3),
                ..Default::default()
            })
            .unwrap();

        let state = ServiceState::new();
        state.initialize_with(config).await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_uninitialized_state_reports_errors() {
        let state = ServiceState::new();
        assert!(!state.is_database_healthy());
        assert!(state.get_config().await.is_err());
        assert!(state.registry().await.is_err());
        assert!(state.coordinator().await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_wires_services() {
        let dir = tempdir().unwrap();
        let state = initialized_state(dir.path()).await;

        assert!(state.is_database_healthy());
        assert_eq!(state.get_config().await.unwrap().fallback_seed, Some(3));
        assert_eq!(state.registry().await.unwrap().len(), 21);
        assert!(state.coordinator().await.is_ok());
        assert!(dir.path().join("analysis.db").exists());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let state = initialized_state(dir.path()).await;
        let other = ConfigService::with_path(dir.path().join("other.json")).unwrap();
        state.initialize_with(other).await.unwrap();
        assert_eq!(state.get_config().await.unwrap().fallback_seed, Some(3));
    }
}
