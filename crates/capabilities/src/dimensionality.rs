//! Dimensionality Reduction Capabilities
//!
//! - `Pca` - principal component analysis of the z-scored numeric columns

use serde_json::{json, Map, Value};
use tracing::debug;

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to, Standardizer};
use crate::support;

pub struct Pca;

impl Capability for Pca {
    fn id(&self) -> &str {
        "pca"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let features = support::feature_columns(dataset, &[]);
        if features.len() < 2 {
            return Err(CoreError::invalid_data(
                "PCA needs at least two numeric columns",
            ));
        }
        let requested = parameters.usize_or("n_components", 2).max(1);
        let n_components = requested.min(features.len());
        let (rows, _) = support::feature_matrix(dataset, &features, 3)?;

        let scaler = Standardizer::fit(&rows);
        let data = math::to_array2(&scaler.transform(&rows))?;
        let covariance = math::covariance(&data);
        let (eigenvalues, eigenvectors) = math::symmetric_eigen(&covariance)?;
        let total: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        if total <= 0.0 {
            return Err(CoreError::computation("all columns are constant"));
        }
        debug!("PCA eigenvalues: {:?}", eigenvalues);

        let ratios: Vec<f64> = eigenvalues
            .iter()
            .take(n_components)
            .map(|v| v.max(0.0) / total)
            .collect();
        let cumulative: f64 = ratios.iter().sum();

        let components: Vec<Value> = (0..n_components)
            .map(|c| {
                let mut loadings = Map::new();
                for (j, name) in features.iter().enumerate() {
                    loadings.insert(name.clone(), json!(round_to(eigenvectors[[j, c]], 4)));
                }
                json!({
                    "component": format!("PC{}", c + 1),
                    "explained_variance_ratio": round_to(ratios[c], 4),
                    "loadings": loadings,
                })
            })
            .collect();

        let mut output = CapabilityOutput::new(format!(
            "El análisis PCA reduce {} variables a {} componentes que explican el {:.1}% de la \
             varianza.",
            features.len(),
            n_components,
            cumulative * 100.0
        ))
        .with_result("features", json!(features))
        .with_result("components", Value::Array(components));
        if requested > n_components {
            output = output.with_result("n_components_capped", true);
        }
        Ok(output
            .with_metric("n_components", n_components as f64)
            .with_metric("explained_variance_total", cumulative)
            .with_metric("first_component_ratio", ratios[0]))
    }
}
