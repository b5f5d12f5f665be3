//! Result Store
//!
//! Boundary between the lifecycle coordinator and persistent storage:
//! status updates of uploaded files, storage of finished results and lookup
//! of stored datasets. `SqliteResultStore` implements it over [`Database`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use ml_analysis_core::AnalysisError;

use crate::models::analysis::{AnalysisResult, AnalysisRun, AnalysisStatus};
use crate::storage::database::{Database, NewAnalysisResult};
use crate::utils::error::{AppError, AppResult};

/// A dataset already held by the storage layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_id: String,
    pub file_name: String,
    /// Absolute location of the payload
    pub path: PathBuf,
}

/// Persistence contract of the lifecycle coordinator.
///
/// Every failure is reported as `AnalysisError::Persistence`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a finished result and return its identifier
    async fn persist(
        &self,
        run: &AnalysisRun,
        result: &AnalysisResult,
    ) -> Result<String, AnalysisError>;

    /// Record the status of the uploaded file an analysis belongs to
    async fn set_status(
        &self,
        file_id: &str,
        status: AnalysisStatus,
        result_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AnalysisError>;

    /// Locate a previously uploaded dataset
    async fn fetch_dataset(&self, file_id: &str) -> Result<StoredFile, AnalysisError>;
}

/// `ResultStore` backed by the SQLite database
#[derive(Debug, Clone)]
pub struct SqliteResultStore {
    db: Database,
    storage_root: PathBuf,
}

impl SqliteResultStore {
    pub fn new(db: Database, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            storage_root: storage_root.into(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Run a blocking database call off the async executor
    async fn blocking<T, F>(&self, op: F) -> Result<T, AnalysisError>
    where
        T: Send + 'static,
        F: FnOnce(Database) -> AppResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(db))
            .await
            .map_err(|e| AnalysisError::persistence(format!("Storage task failed: {}", e)))?
            .map_err(AnalysisError::from)
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn persist(
        &self,
        run: &AnalysisRun,
        result: &AnalysisResult,
    ) -> Result<String, AnalysisError> {
        let document = serde_json::to_string(&result.to_document())
            .map_err(|e| AnalysisError::persistence(e.to_string()))?;
        let metrics = serde_json::to_string(&result.metrics)
            .map_err(|e| AnalysisError::persistence(e.to_string()))?;

        let analysis_id = run.analysis_id.clone();
        let file_id = run.file_id.clone();
        let model_type = result.model_type.clone();
        let industry = result.industry.clone();
        let fallback = result.used_fallback();

        let result_id = self
            .blocking(move |db| {
                db.insert_analysis_result(&NewAnalysisResult {
                    analysis_id: &analysis_id,
                    file_id: &file_id,
                    model_type: &model_type,
                    industry: &industry,
                    result: &document,
                    metrics: &metrics,
                    fallback,
                })
            })
            .await?;

        info!("Stored analysis result with ID: {}", result_id);
        Ok(result_id)
    }

    async fn set_status(
        &self,
        file_id: &str,
        status: AnalysisStatus,
        result_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AnalysisError> {
        let file_id = file_id.to_string();
        let result_id = result_id.map(str::to_string);
        let error_message = error_message.map(str::to_string);

        let id = file_id.clone();
        self.blocking(move |db| {
            db.update_file_status(
                &id,
                status.as_str(),
                result_id.as_deref(),
                error_message.as_deref(),
            )
        })
        .await?;

        debug!("Updated file {} status to {}", file_id, status);
        Ok(())
    }

    async fn fetch_dataset(&self, file_id: &str) -> Result<StoredFile, AnalysisError> {
        let id = file_id.to_string();
        let row = self
            .blocking(move |db| {
                db.get_file(&id)?
                    .ok_or_else(|| AppError::not_found(format!("Uploaded file {}", id)))
            })
            .await?;

        let stored = Path::new(&row.file_path);
        let path = if stored.is_absolute() {
            stored.to_path_buf()
        } else {
            self.storage_root.join(stored)
        };

        Ok(StoredFile {
            file_id: row.id,
            file_name: row.file_name,
            path,
        })
    }
}
