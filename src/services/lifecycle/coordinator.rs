//! Analysis Coordinator
//!
//! Accepts requests, answers immediately with an analysis id and drives
//! each run to a terminal state on its own tokio task:
//!
//! 1. Queued → Processing, reported to the result store.
//! 2. Execution on the blocking pool, optionally under a watchdog.
//! 3. Recommendations, persistence, then Completed with the result id.
//!
//! Any failure ends the run in Failed with a tagged reason, followed by a
//! best-effort status update. A panic anywhere in the run counts as an
//! orchestration failure. Requests are never rejected at submission.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ml_analysis_core::AnalysisError;

use super::staging::{stage_bytes, stage_file, StagedPayload};
use crate::models::analysis::{Acceptance, AnalysisRequest, AnalysisRun, AnalysisStatus};
use crate::services::executor::{panic_message, AnalysisExecutor};
use crate::services::recommendations::RecommendationEngine;
use crate::storage::result_store::ResultStore;

/// Where the dataset of a run comes from
enum Payload {
    /// Uploaded bytes, already staged
    Staged(StagedPayload),
    /// A file the result store already holds
    Stored,
    /// Staging failed before the run could start
    Rejected(AnalysisError),
}

#[derive(Clone)]
pub struct AnalysisCoordinator {
    executor: Arc<AnalysisExecutor>,
    engine: Arc<RecommendationEngine>,
    store: Arc<dyn ResultStore>,
    staging_dir: PathBuf,
    timeout: Option<Duration>,
}

impl AnalysisCoordinator {
    pub fn new(
        executor: Arc<AnalysisExecutor>,
        engine: Arc<RecommendationEngine>,
        store: Arc<dyn ResultStore>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            engine,
            store,
            staging_dir: staging_dir.into(),
            timeout: None,
        }
    }

    /// Bound the execution step; `None` disables the watchdog
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Accept an uploaded payload. Must be called inside a tokio runtime.
    pub fn accept_upload(
        &self,
        request: AnalysisRequest,
        bytes: &[u8],
        file_name: &str,
    ) -> (Acceptance, JoinHandle<AnalysisRun>) {
        let payload = match stage_bytes(&self.staging_dir, bytes, file_name) {
            Ok(staged) => Payload::Staged(staged),
            Err(err) => Payload::Rejected(err),
        };
        self.spawn(request, payload)
    }

    /// Accept a request for a dataset already held by the result store.
    /// Must be called inside a tokio runtime.
    pub fn accept_from_storage(
        &self,
        request: AnalysisRequest,
    ) -> (Acceptance, JoinHandle<AnalysisRun>) {
        self.spawn(request, Payload::Stored)
    }

    fn spawn(
        &self,
        request: AnalysisRequest,
        payload: Payload,
    ) -> (Acceptance, JoinHandle<AnalysisRun>) {
        let run = AnalysisRun::new(request.file_id.clone());
        let acceptance = Acceptance::processing(run.analysis_id.clone());
        info!(
            analysis_id = %run.analysis_id,
            file_id = %run.file_id,
            model_type = %request.model_type,
            industry = %request.industry,
            "analysis accepted"
        );

        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.drive(run, request, payload).await });
        (acceptance, handle)
    }

    async fn drive(
        self,
        mut run: AnalysisRun,
        request: AnalysisRequest,
        payload: Payload,
    ) -> AnalysisRun {
        if let Err(err) = run.start() {
            error!(analysis_id = %run.analysis_id, error = %err, "analysis could not start");
            return run;
        }

        let outcome = AssertUnwindSafe(self.process(&run, &request, payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(AnalysisError::orchestration(format!(
                    "Analysis task panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match outcome {
            Ok(result_id) => {
                info!(analysis_id = %run.analysis_id, result_id = %result_id, "analysis completed");
                if let Err(err) = run.complete(result_id) {
                    error!(
                        analysis_id = %run.analysis_id,
                        error = %err,
                        "analysis could not complete"
                    );
                }
            }
            Err(reason) => {
                error!(analysis_id = %run.analysis_id, error = %reason, "analysis failed");
                let message = reason.to_string();
                if let Err(err) = self
                    .store
                    .set_status(&run.file_id, AnalysisStatus::Failed, None, Some(&message))
                    .await
                {
                    warn!(
                        analysis_id = %run.analysis_id,
                        error = %err,
                        "failed status could not be recorded"
                    );
                }
                if let Err(err) = run.fail(reason) {
                    error!(analysis_id = %run.analysis_id, error = %err, "analysis could not fail");
                }
            }
        }

        run
    }

    async fn process(
        &self,
        run: &AnalysisRun,
        request: &AnalysisRequest,
        payload: Payload,
    ) -> Result<String, AnalysisError> {
        self.store
            .set_status(&run.file_id, AnalysisStatus::Processing, None, None)
            .await?;

        // --- Stage ---
        let staged = match payload {
            Payload::Staged(staged) => staged,
            Payload::Stored => self.stage_stored(&run.file_id).await?,
            Payload::Rejected(err) => return Err(err),
        };

        // --- Execute ---
        let execution = {
            let executor = Arc::clone(&self.executor);
            let reference = staged.reference();
            let model_type = request.model_type.clone();
            let industry = request.industry.clone();
            let parameters = request.parameters.clone();
            let task = tokio::task::spawn_blocking(move || {
                executor.execute(&reference, &model_type, &industry, &parameters)
            });

            let joined = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, task)
                    .await
                    .map_err(|_| AnalysisError::Timeout(limit.as_secs()))?,
                None => task.await,
            };
            joined.map_err(|e| {
                AnalysisError::orchestration(format!("Execution task failed: {}", e))
            })??
        };
        drop(staged);

        // --- Persist ---
        let result = self.engine.recommend(execution, &request.industry);
        let result_id = self.store.persist(run, &result).await?;
        self.store
            .set_status(&run.file_id, AnalysisStatus::Completed, Some(&result_id), None)
            .await?;

        Ok(result_id)
    }

    async fn stage_stored(&self, file_id: &str) -> Result<StagedPayload, AnalysisError> {
        let stored = self.store.fetch_dataset(file_id).await?;
        let staging_dir = self.staging_dir.clone();
        tokio::task::spawn_blocking(move || {
            stage_file(&staging_dir, &stored.path, &stored.file_name)
        })
        .await
        .map_err(|e| AnalysisError::orchestration(format!("Staging task failed: {}", e)))?
    }
}

impl std::fmt::Debug for AnalysisCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCoordinator")
            .field("staging_dir", &self.staging_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}
