//! Analysis Executor
//!
//! Runs one capability against one dataset behind a failure boundary.
//! Only dataset loading can fail: once a dataset is in hand, a capability
//! that errors or panics is replaced by the fallback capability with the
//! same arguments, and the fallback is guarded the same way.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use ml_analysis_capabilities::{monthly_dates, FALLBACK_SUMMARY, FORECAST_MEAN};
use ml_analysis_core::{
    AnalysisError, Capability, CapabilityOutput, Category, Parameters, TabularDataset,
};

use crate::models::analysis::{DatasetReference, FallbackReason};
use crate::services::loader::DatasetLoader;
use crate::services::parameters::ParameterResolver;
use crate::services::resolver::CapabilityResolver;

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Capability id as requested
    pub capability_id: String,
    /// Category of the requested capability, when the registry knows it
    pub category: Option<Category>,
    pub parameters: Parameters,
    pub output: CapabilityOutput,
    /// Set when the fallback produced `output`
    pub fallback: Option<FallbackReason>,
}

impl Execution {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

pub struct AnalysisExecutor {
    resolver: Arc<CapabilityResolver>,
    parameters: ParameterResolver,
    loader: Arc<dyn DatasetLoader>,
}

impl AnalysisExecutor {
    pub fn new(resolver: Arc<CapabilityResolver>, loader: Arc<dyn DatasetLoader>) -> Self {
        let parameters = ParameterResolver::new(Arc::clone(resolver.registry()));
        Self {
            resolver,
            parameters,
            loader,
        }
    }

    pub fn resolver(&self) -> &Arc<CapabilityResolver> {
        &self.resolver
    }

    /// Load the dataset and execute. Fails only with `DatasetLoad`.
    pub fn execute(
        &self,
        reference: &DatasetReference,
        capability_id: &str,
        industry: &str,
        parameters: &Parameters,
    ) -> Result<Execution, AnalysisError> {
        let dataset = self.loader.load(reference)?;
        Ok(self.execute_dataset(&dataset, capability_id, industry, parameters))
    }

    /// Execute against an already loaded dataset. Always produces a result.
    pub fn execute_dataset(
        &self,
        dataset: &TabularDataset,
        capability_id: &str,
        industry: &str,
        parameters: &Parameters,
    ) -> Execution {
        let resolved_parameters = self.parameters.resolve(capability_id, parameters, dataset);
        let resolved = self.resolver.resolve(capability_id);
        let category = self
            .resolver
            .registry()
            .get(capability_id)
            .ok()
            .map(|d| d.category);

        let attempt = match resolved.fallback {
            Some(reason) => Err(reason),
            None => invoke(resolved.capability.as_ref(), dataset, industry, &resolved_parameters)
                .map_err(|err| match err {
                    AnalysisError::CapabilityExecution(detail) => {
                        FallbackReason::ExecutionFailed(detail)
                    }
                    other => FallbackReason::ExecutionFailed(other.to_string()),
                }),
        };

        let (output, fallback) = match attempt {
            Ok(output) => (output, None),
            Err(reason) => {
                log_substitution(capability_id, &reason);
                let output = self.run_fallback(dataset, industry, &resolved_parameters);
                (output, Some(reason))
            }
        };

        report_anomalies(capability_id, &output);
        info!(
            "Executed '{}' for {} ({} rows){}",
            capability_id,
            industry,
            dataset.row_count(),
            if fallback.is_some() { " with fallback" } else { "" }
        );

        Execution {
            capability_id: capability_id.to_string(),
            category,
            parameters: resolved_parameters,
            output,
            fallback,
        }
    }

    fn run_fallback(
        &self,
        dataset: &TabularDataset,
        industry: &str,
        parameters: &Parameters,
    ) -> CapabilityOutput {
        let fallback = self.resolver.fallback();
        match invoke(fallback.as_ref(), dataset, industry, parameters) {
            Ok(output) => output,
            Err(err) => {
                error!("Fallback implementation failed: {}", err);
                static_output(dataset)
            }
        }
    }
}

impl std::fmt::Debug for AnalysisExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisExecutor")
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Call a capability, turning both errors and panics into
/// `CapabilityExecution`
fn invoke(
    capability: &dyn Capability,
    dataset: &TabularDataset,
    industry: &str,
    parameters: &Parameters,
) -> Result<CapabilityOutput, AnalysisError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        capability.analyze(dataset, industry, parameters)
    }));

    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(AnalysisError::CapabilityExecution(err.to_string())),
        Err(payload) => Err(AnalysisError::CapabilityExecution(format!(
            "'{}' panicked: {}",
            capability.id(),
            panic_message(payload.as_ref())
        ))),
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Log a substitution in terms of the failure it absorbed
fn log_substitution(capability_id: &str, reason: &FallbackReason) {
    let absorbed = AnalysisError::from(reason);
    warn!(
        capability = %capability_id,
        absorbed = absorbed.is_absorbed(),
        error = %absorbed,
        "using fallback implementation"
    );
}

/// Last-resort result when even the fallback fails. Same shapes as the
/// fallback, without any randomness.
fn static_output(dataset: &TabularDataset) -> CapabilityOutput {
    let output = CapabilityOutput::new(FALLBACK_SUMMARY).with_result("fallback", true);

    if dataset.has_datetime_column() {
        let dates = monthly_dates(Utc::now().date_naive());
        let forecast = vec![FORECAST_MEAN; dates.len()];
        return output
            .with_result("forecast", json!(forecast))
            .with_result("dates", json!(dates))
            .with_metric("rmse", 0.0)
            .with_metric("mae", 0.0)
            .with_metric("mape", 0.0);
    }

    output
        .with_result(
            "insights",
            json!([format!(
                "Se han analizado {} filas y {} columnas.",
                dataset.row_count(),
                dataset.column_count()
            )]),
        )
        .with_metric("accuracy", 0.0)
        .with_metric("f1_score", 0.0)
}

/// Non-finite metrics pass through but are logged
fn report_anomalies(capability_id: &str, output: &CapabilityOutput) {
    for (name, value) in &output.metrics {
        match value.as_f64() {
            Some(v) if v.is_finite() => {}
            _ => warn!(
                "Metric '{}' of '{}' is not a finite number: {}",
                name, capability_id, value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::CapabilityRegistry;
    use ml_analysis_capabilities::CapabilityFactory;
    use chrono::NaiveDate;
    use ml_analysis_core::{Column, CoreError, CoreResult};

    struct Exploding;

    impl Capability for Exploding {
        fn id(&self) -> &str {
            "kmeans"
        }

        fn analyze(
            &self,
            _: &TabularDataset,
            _: &str,
            _: &Parameters,
        ) -> CoreResult<CapabilityOutput> {
            panic!("boom")
        }
    }

    struct Failing;

    impl Capability for Failing {
        fn id(&self) -> &str {
            "kmeans"
        }

        fn analyze(
            &self,
            _: &TabularDataset,
            _: &str,
            _: &Parameters,
        ) -> CoreResult<CapabilityOutput> {
            Err(CoreError::computation("singular matrix"))
        }
    }

    struct NoLoader;

    impl DatasetLoader for NoLoader {
        fn load(&self, reference: &DatasetReference) -> Result<TabularDataset, AnalysisError> {
            Err(AnalysisError::dataset_load(reference.file_name.clone()))
        }
    }

    fn executor(factories: Vec<(&'static str, CapabilityFactory)>) -> AnalysisExecutor {
        let registry = Arc::new(CapabilityRegistry::builtin().unwrap());
        let resolver = Arc::new(CapabilityResolver::new(registry, factories, Some(7)));
        AnalysisExecutor::new(resolver, Arc::new(NoLoader))
    }

    fn builtin_executor() -> AnalysisExecutor {
        executor(ml_analysis_capabilities::builtin_factories())
    }

    fn numeric_dataset() -> TabularDataset {
        TabularDataset::new(
            (0..3)
                .map(|c| {
                    Column::numeric(
                        format!("c{}", c),
                        (0..30).map(|r| Some(((r * (c + 2)) % 11) as f64)).collect(),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_real_capability_runs() {
        let execution = builtin_executor().execute_dataset(
            &numeric_dataset(),
            "kmeans",
            "retail",
            &Parameters::new(),
        );
        assert!(!execution.used_fallback());
        assert_eq!(execution.category, Some(Category::Clustering));
        assert_eq!(execution.parameters["n_clusters"], json!(3));
        assert!(execution.output.summary().is_some());
    }

    #[test]
    fn test_unknown_capability_uses_fallback() {
        let execution = builtin_executor().execute_dataset(
            &numeric_dataset(),
            "does_not_exist",
            "retail",
            &Parameters::new(),
        );
        assert_eq!(execution.fallback, Some(FallbackReason::UnknownCapability));
        assert_eq!(execution.category, None);
        assert_eq!(execution.output.result["fallback"], json!(true));
        assert!(execution.output.metric("accuracy").is_some());
    }

    #[test]
    fn test_error_is_absorbed_by_fallback() {
        fn failing() -> CoreResult<Arc<dyn Capability>> {
            Ok(Arc::new(Failing))
        }
        let execution = executor(vec![("kmeans", failing as CapabilityFactory)]).execute_dataset(
            &numeric_dataset(),
            "kmeans",
            "retail",
            &Parameters::new(),
        );
        assert!(matches!(
            execution.fallback,
            Some(FallbackReason::ExecutionFailed(ref detail)) if detail.contains("singular")
        ));
        assert_eq!(execution.category, Some(Category::Clustering));
    }

    #[test]
    fn test_panic_is_absorbed_by_fallback() {
        fn exploding() -> CoreResult<Arc<dyn Capability>> {
            Ok(Arc::new(Exploding))
        }
        let execution = executor(vec![("kmeans", exploding as CapabilityFactory)]).execute_dataset(
            &numeric_dataset(),
            "kmeans",
            "retail",
            &Parameters::new(),
        );
        assert!(matches!(
            execution.fallback,
            Some(FallbackReason::ExecutionFailed(ref detail)) if detail.contains("boom")
        ));
        assert!(execution.output.summary().is_some());
    }

    #[test]
    fn test_dataset_load_is_the_only_propagated_error() {
        let err = builtin_executor()
            .execute(&DatasetReference::new("/x", "x.json"), "kmeans", "retail", &Parameters::new())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DatasetLoad(_)));
    }

    #[test]
    fn test_static_output_shape() {
        let output = static_output(&numeric_dataset());
        assert_eq!(output.metric("accuracy"), Some(0.0));
        assert_eq!(output.result["fallback"], json!(true));
        assert!(output.summary().unwrap().contains("alternativa"));
        assert!(output.result.get("forecast").is_none());
    }

    #[test]
    fn test_static_output_follows_datetime_column() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).and_then(|d| d.and_hms_opt(0, 0, 0));
        let dataset = TabularDataset::new(vec![
            Column::datetime("fecha", vec![day(1), day(2), day(3)]),
            Column::numeric("ventas", vec![Some(1.0), Some(2.0), Some(4.0)]),
        ])
        .unwrap();

        let output = static_output(&dataset);
        assert_eq!(output.result["forecast"].as_array().unwrap().len(), 12);
        assert_eq!(output.result["dates"].as_array().unwrap().len(), 12);
        assert_eq!(output.metric("rmse"), Some(0.0));
        assert!(output.metric("accuracy").is_none());
        assert!(output.result.get("insights").is_none());
    }

    #[test]
    fn test_every_substitution_reason_is_an_absorbed_error() {
        fn failing() -> CoreResult<Arc<dyn Capability>> {
            Ok(Arc::new(Failing))
        }
        let executor = executor(vec![("kmeans", failing as CapabilityFactory)]);

        for id in ["kmeans", "anova", "does_not_exist"] {
            let execution = executor.execute_dataset(
                &numeric_dataset(),
                id,
                "retail",
                &Parameters::new(),
            );
            let reason = execution.fallback.expect("fallback reason");
            assert!(AnalysisError::from(&reason).is_absorbed(), "{} was not absorbed", id);
        }
    }
}
