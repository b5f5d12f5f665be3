//! Lifecycle Integration Tests
//!
//! Tests for the analysis coordinator using a real in-memory SQLite store:
//! - Accepted runs reach Completed with a stored result document
//! - Unresolvable datasets end Failed without a result id
//! - Persistence failures end Failed even after a successful execution
//! - Concurrent runs stay independent

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use ml_analysis_core::AnalysisError;
use ml_analysis_service::models::analysis::{
    AnalysisRequest, AnalysisResult, AnalysisRun, AnalysisStatus,
};
use ml_analysis_service::services::{
    AnalysisCoordinator, AnalysisExecutor, CapabilityRegistry, CapabilityResolver,
    FileDatasetLoader, RecommendationEngine,
};
use ml_analysis_service::storage::{Database, ResultStore, SqliteResultStore, StoredFile};

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    _staging: TempDir,
    files: TempDir,
    store: Arc<SqliteResultStore>,
    coordinator: AnalysisCoordinator,
}

fn coordinator_over(store: Arc<dyn ResultStore>, staging: &Path) -> AnalysisCoordinator {
    let registry = Arc::new(CapabilityRegistry::builtin().unwrap());
    let resolver = Arc::new(CapabilityResolver::builtin(Arc::clone(&registry), Some(5)));
    let executor = Arc::new(AnalysisExecutor::new(resolver, Arc::new(FileDatasetLoader::new())));
    let engine = Arc::new(RecommendationEngine::builtin(registry));
    AnalysisCoordinator::new(executor, engine, store, staging)
}

fn fixture() -> Fixture {
    let staging = tempdir().unwrap();
    let files = tempdir().unwrap();
    let store = Arc::new(SqliteResultStore::new(
        Database::new_in_memory().unwrap(),
        files.path(),
    ));
    let coordinator = coordinator_over(store.clone(), staging.path());
    Fixture {
        _staging: staging,
        files,
        store,
        coordinator,
    }
}

/// Five numeric columns, fifty rows
fn customers_json() -> String {
    let rows: Vec<Value> = (0..50)
        .map(|r| {
            let segment = (r % 3) as f64 * 25.0;
            json!({
                "gasto": segment + (r % 4) as f64,
                "visitas": segment / 5.0 + (r % 3) as f64,
                "antiguedad": segment * 2.0 + (r % 5) as f64,
                "devoluciones": (r % 2) as f64 + segment / 25.0,
                "ticket": segment + 10.0 + (r % 6) as f64,
            })
        })
        .collect();
    serde_json::to_string(&rows).unwrap()
}

fn stored_document(store: &SqliteResultStore, result_id: &str) -> Value {
    let row = store.database().get_analysis_result(result_id).unwrap().unwrap();
    serde_json::from_str(&row.result).unwrap()
}

/// Store whose writes of results always fail
struct ReadOnlyStore(SqliteResultStore);

#[async_trait]
impl ResultStore for ReadOnlyStore {
    async fn persist(&self, _: &AnalysisRun, _: &AnalysisResult) -> Result<String, AnalysisError> {
        Err(AnalysisError::persistence("database is read-only"))
    }

    async fn set_status(
        &self,
        file_id: &str,
        status: AnalysisStatus,
        result_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AnalysisError> {
        self.0.set_status(file_id, status, result_id, error_message).await
    }

    async fn fetch_dataset(&self, file_id: &str) -> Result<StoredFile, AnalysisError> {
        self.0.fetch_dataset(file_id).await
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_upload_kmeans_retail_completes() {
    let fx = fixture();
    fx.store
        .database()
        .register_file("clientes", "clientes.json", "clientes.json")
        .unwrap();

    let (acceptance, handle) = fx.coordinator.accept_upload(
        AnalysisRequest::new("clientes", "kmeans", "retail"),
        customers_json().as_bytes(),
        "clientes.json",
    );
    assert_eq!(acceptance.status, AnalysisStatus::Processing);
    assert!(!acceptance.message.is_empty());

    let run = handle.await.unwrap();
    assert_eq!(run.status(), AnalysisStatus::Completed);
    let result_id = run.result_id().unwrap();

    let document = stored_document(&fx.store, result_id);
    assert_eq!(document["parameters"]["n_clusters"], json!(3));
    assert_eq!(document["clusters"].as_array().unwrap().len(), 3);
    let actions = document["actions"].as_array().unwrap();
    assert!(actions
        .iter()
        .any(|a| a["title"] == "Segmentación de clientes" && a["priority"] == "high"));
    assert!(!document["visualizations"].as_array().unwrap().is_empty());

    let file = fx.store.database().get_file("clientes").unwrap().unwrap();
    assert_eq!(file.status, "completed");
    assert_eq!(file.result_id.as_deref(), Some(result_id));
}

#[tokio::test]
async fn test_stored_dataset_completes() {
    let fx = fixture();
    std::fs::write(fx.files.path().join("clientes.json"), customers_json()).unwrap();
    fx.store
        .database()
        .register_file("clientes", "clientes.json", "clientes.json")
        .unwrap();

    let (_, handle) = fx
        .coordinator
        .accept_from_storage(AnalysisRequest::new("clientes", "pca", "finanzas"));
    let run = handle.await.unwrap();

    assert_eq!(run.status(), AnalysisStatus::Completed);
    let row = fx
        .store
        .database()
        .get_analysis_result(run.result_id().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(row.analysis_id, run.analysis_id);
    assert!(!row.fallback);
}

#[tokio::test]
async fn test_stored_workbook_completes() {
    let fx = fixture();
    let workbook = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ventas.xlsx");
    std::fs::copy(&workbook, fx.files.path().join("ventas.xlsx")).unwrap();
    fx.store
        .database()
        .register_file("ventas", "ventas.xlsx", "ventas.xlsx")
        .unwrap();

    let (_, handle) = fx
        .coordinator
        .accept_from_storage(AnalysisRequest::new("ventas", "linear_regression", "retail"));
    let run = handle.await.unwrap();

    assert_eq!(run.status(), AnalysisStatus::Completed);
    let document = stored_document(&fx.store, run.result_id().unwrap());
    assert_eq!(document["parameters"]["target_column"], json!("Ventas"));
}

#[tokio::test]
async fn test_unresolvable_dataset_ends_failed() {
    let fx = fixture();
    fx.store
        .database()
        .register_file("perdido", "perdido.xlsx", "no/existe/perdido.xlsx")
        .unwrap();

    let (_, handle) = fx
        .coordinator
        .accept_from_storage(AnalysisRequest::new("perdido", "kmeans", "retail"));
    let run = handle.await.unwrap();

    assert_eq!(run.status(), AnalysisStatus::Failed);
    assert!(run.result_id().is_none());
    assert!(matches!(run.failure(), Some(AnalysisError::DatasetLoad(_))));

    let file = fx.store.database().get_file("perdido").unwrap().unwrap();
    assert_eq!(file.status, "failed");
    assert!(file.result_id.is_none());
    assert!(file.error_message.is_some());
    assert!(fx.store.database().get_results_for_file("perdido").unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_capability_still_completes_with_fallback() {
    let fx = fixture();
    fx.store
        .database()
        .register_file("clientes", "clientes.json", "clientes.json")
        .unwrap();

    let (_, handle) = fx.coordinator.accept_upload(
        AnalysisRequest::new("clientes", "does_not_exist", "retail"),
        customers_json().as_bytes(),
        "clientes.json",
    );
    let run = handle.await.unwrap();

    assert_eq!(run.status(), AnalysisStatus::Completed);
    let row = fx
        .store
        .database()
        .get_analysis_result(run.result_id().unwrap())
        .unwrap()
        .unwrap();
    assert!(row.fallback);
    let metrics: Value = serde_json::from_str(&row.metrics).unwrap();
    assert!(!metrics.as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_ends_failed() {
    let staging = tempdir().unwrap();
    let inner = SqliteResultStore::new(Database::new_in_memory().unwrap(), "/srv");
    inner
        .database()
        .register_file("clientes", "clientes.json", "clientes.json")
        .unwrap();
    let db = inner.database().clone();
    let coordinator = coordinator_over(Arc::new(ReadOnlyStore(inner)), staging.path());

    let (_, handle) = coordinator.accept_upload(
        AnalysisRequest::new("clientes", "kmeans", "retail"),
        customers_json().as_bytes(),
        "clientes.json",
    );
    let run = handle.await.unwrap();

    assert_eq!(run.status(), AnalysisStatus::Failed);
    assert!(run.result_id().is_none());
    assert!(matches!(run.failure(), Some(AnalysisError::Persistence(_))));

    let file = db.get_file("clientes").unwrap().unwrap();
    assert_eq!(file.status, "failed");
    assert!(file.error_message.unwrap().contains("read-only"));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let fx = fixture();
    let mut handles = Vec::new();
    for (i, model) in ["kmeans", "pca", "hierarchical", "does_not_exist"].iter().enumerate() {
        let file_id = format!("f{}", i);
        fx.store
            .database()
            .register_file(&file_id, "datos.json", "datos.json")
            .unwrap();
        let (acceptance, handle) = fx.coordinator.accept_upload(
            AnalysisRequest::new(&file_id, *model, "salud"),
            customers_json().as_bytes(),
            "datos.json",
        );
        handles.push((acceptance.analysis_id, handle));
    }

    let mut ids = Vec::new();
    for (analysis_id, handle) in handles {
        let run = handle.await.unwrap();
        assert_eq!(run.analysis_id, analysis_id);
        assert_eq!(run.status(), AnalysisStatus::Completed);
        ids.push(run.result_id().unwrap().to_string());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}
