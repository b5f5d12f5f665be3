//! Execution Integration Tests
//!
//! Tests for the executor and recommendation engine wired with the built-in
//! catalog:
//! - Real capabilities compute on realistic datasets
//! - Failing or panicking implementations are replaced by the fallback
//! - Industry-specific actions are attached to results

use std::sync::Arc;

use serde_json::json;

use ml_analysis_capabilities::{CapabilityFactory, FALLBACK_SUMMARY};
use ml_analysis_core::{
    AnalysisError, Capability, CapabilityOutput, Category, Column, CoreError, CoreResult,
    Parameters, TabularDataset,
};
use ml_analysis_service::models::analysis::{DatasetReference, FallbackReason, Priority};
use ml_analysis_service::services::loader::dataset_from_json;
use ml_analysis_service::services::{
    AnalysisExecutor, CapabilityRegistry, CapabilityResolver, DatasetLoader, Execution,
    RecommendationEngine,
};

// ============================================================================
// Helpers
// ============================================================================

struct MemoryLoader(TabularDataset);

impl DatasetLoader for MemoryLoader {
    fn load(&self, _: &DatasetReference) -> Result<TabularDataset, AnalysisError> {
        Ok(self.0.clone())
    }
}

struct Diverging;

impl Capability for Diverging {
    fn id(&self) -> &str {
        "linear_regression"
    }

    fn analyze(&self, _: &TabularDataset, _: &str, _: &Parameters) -> CoreResult<CapabilityOutput> {
        Err(CoreError::computation("matrix is singular"))
    }
}

struct Panicking;

impl Capability for Panicking {
    fn id(&self) -> &str {
        "anova"
    }

    fn analyze(&self, _: &TabularDataset, _: &str, _: &Parameters) -> CoreResult<CapabilityOutput> {
        let empty: Vec<f64> = Vec::new();
        Ok(CapabilityOutput::new("unreachable").with_metric("x", empty[3]))
    }
}

fn registry() -> Arc<CapabilityRegistry> {
    Arc::new(CapabilityRegistry::builtin().unwrap())
}

fn executor_with(factories: Vec<(&'static str, CapabilityFactory)>) -> AnalysisExecutor {
    let resolver = CapabilityResolver::new(registry(), factories, Some(11));
    let loader = MemoryLoader(TabularDataset::new(vec![]).unwrap());
    AnalysisExecutor::new(Arc::new(resolver), Arc::new(loader))
}

fn builtin_executor() -> AnalysisExecutor {
    executor_with(ml_analysis_capabilities::builtin_factories())
}

/// Five numeric columns, fifty rows, three well separated blobs
fn blob_dataset() -> TabularDataset {
    let columns = (0..5)
        .map(|c| {
            let values = (0..50)
                .map(|r| {
                    let center = (r % 3) as f64 * 20.0;
                    let jitter = ((r * 7 + c * 3) % 5) as f64 * 0.2;
                    Some(center + jitter + c as f64)
                })
                .collect();
            Column::numeric(format!("v{}", c + 1), values)
        })
        .collect();
    TabularDataset::new(columns).unwrap()
}

/// Three treatment groups with clearly different means
fn treatment_dataset() -> TabularDataset {
    let rows: Vec<_> = (0..45)
        .map(|i| {
            let group = ["control", "dosis_baja", "dosis_alta"][i % 3];
            let base = [50.0, 58.0, 70.0][i % 3];
            json!({"grupo": group, "presion": base + ((i * 5) % 7) as f64})
        })
        .collect();
    dataset_from_json(&serde_json::to_string(&rows).unwrap()).unwrap()
}

fn titles(actions: &[ml_analysis_service::ActionRecommendation]) -> Vec<&str> {
    actions.iter().map(|a| a.title.as_str()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_kmeans_retail_scenario() {
    let execution =
        builtin_executor().execute_dataset(&blob_dataset(), "kmeans", "retail", &Parameters::new());

    assert!(!execution.used_fallback());
    assert_eq!(execution.parameters["n_clusters"], json!(3));
    assert_eq!(execution.output.result["clusters"].as_array().unwrap().len(), 3);

    let result = RecommendationEngine::builtin(registry()).recommend(execution, "retail");
    assert!(titles(&result.actions).contains(&"Segmentación de clientes"));
    assert!(result.complementary.iter().all(|s| s.id != "kmeans"));
}

#[test]
fn test_unknown_capability_scenario() {
    let execution = builtin_executor().execute_dataset(
        &blob_dataset(),
        "does_not_exist",
        "retail",
        &Parameters::new(),
    );

    assert_eq!(execution.fallback, Some(FallbackReason::UnknownCapability));
    assert_eq!(execution.output.summary(), Some(FALLBACK_SUMMARY));
    assert!(execution.output.summary().unwrap().contains("alternativa"));
    assert!(!execution.output.metrics.is_empty());
    assert!(execution.output.metrics.values().all(|v| v.as_f64().is_some_and(f64::is_finite)));
}

#[test]
fn test_anova_salud_scenario() {
    let execution = builtin_executor().execute_dataset(
        &treatment_dataset(),
        "anova",
        "salud",
        &Parameters::new(),
    );
    assert!(!execution.used_fallback());
    assert_eq!(execution.parameters["group_column"], json!("grupo"));
    assert!(execution.output.metric("p_value").unwrap() < 0.05);

    let result = RecommendationEngine::builtin(registry()).recommend(execution, "salud");
    let clinical = result
        .actions
        .iter()
        .find(|a| a.title == "Validación clínica de resultados")
        .expect("clinical validation action");
    assert_eq!(clinical.priority, Priority::Critical);
}

#[test]
fn test_reported_p_value_drives_clinical_action() {
    let execution = Execution {
        capability_id: "anova".to_string(),
        category: Some(Category::Statistical),
        parameters: Parameters::new(),
        output: CapabilityOutput::new("ANOVA").with_metric("p_value", 0.03),
        fallback: None,
    };
    let result = RecommendationEngine::builtin(registry()).recommend(execution, "salud");
    assert!(result.actions.iter().any(|a| {
        a.priority == Priority::Critical && a.title == "Validación clínica de resultados"
    }));
}

// ============================================================================
// Failure boundary
// ============================================================================

#[test]
fn test_computation_error_is_replaced_by_fallback() {
    fn diverging() -> CoreResult<Arc<dyn Capability>> {
        Ok(Arc::new(Diverging))
    }

    let executor = executor_with(vec![("linear_regression", diverging as CapabilityFactory)]);
    let execution = executor.execute_dataset(
        &blob_dataset(),
        "linear_regression",
        "finanzas",
        &Parameters::new(),
    );

    assert!(matches!(execution.fallback, Some(FallbackReason::ExecutionFailed(_))));
    assert_eq!(execution.category, Some(Category::Regression));
    assert!(execution.output.summary().is_some());
    assert!(!execution.output.metrics.is_empty());
}

#[test]
fn test_panic_is_replaced_by_fallback() {
    fn panicking() -> CoreResult<Arc<dyn Capability>> {
        Ok(Arc::new(Panicking))
    }

    let execution = executor_with(vec![("anova", panicking as CapabilityFactory)]).execute_dataset(
        &treatment_dataset(),
        "anova",
        "salud",
        &Parameters::new(),
    );

    assert!(matches!(execution.fallback, Some(FallbackReason::ExecutionFailed(_))));
    assert_eq!(execution.output.result["fallback"], json!(true));
}

#[test]
fn test_unavailable_implementation_is_replaced_by_fallback() {
    fn broken() -> CoreResult<Arc<dyn Capability>> {
        Err(CoreError::config("model weights missing"))
    }

    let executor = executor_with(vec![("pca", broken as CapabilityFactory)]);
    let execution =
        executor.execute_dataset(&blob_dataset(), "pca", "tecnologia", &Parameters::new());
    assert!(matches!(
        execution.fallback,
        Some(FallbackReason::ImplementationUnavailable(ref detail)) if detail.contains("weights")
    ));
}

#[test]
fn test_invalid_data_still_produces_result() {
    // no numeric columns for a regression
    let dataset = TabularDataset::new(vec![Column::text(
        "nombre",
        (0..10).map(|i| Some(format!("n{}", i))).collect(),
    )])
    .unwrap();

    let execution = builtin_executor().execute_dataset(
        &dataset,
        "ridge_regression",
        "finanzas",
        &Parameters::new(),
    );
    assert!(execution.used_fallback());
    assert!(execution.output.summary().is_some());
}

#[test]
fn test_fallback_output_is_seeded() {
    let run = || {
        builtin_executor().execute_dataset(
            &blob_dataset(),
            "does_not_exist",
            "retail",
            &Parameters::new(),
        )
    };
    let first = run();
    let second = run();
    assert_eq!(first.output, second.output);
}
