//! Regression Capabilities
//!
//! - `LinearRegression` - ordinary least squares
//! - `PolynomialRegression` - per-feature polynomial expansion of z-scored inputs
//! - `RidgeRegression` - L2-penalized least squares on z-scored inputs
//!
//! `target_column` is the response; every other numeric column is a
//! predictor. Fit quality is reported in-sample.

use ndarray::Array1;
use serde_json::{json, Map, Value};

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to, Standardizer};
use crate::support;

struct Design {
    target: String,
    features: Vec<String>,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl Design {
    fn prepare(dataset: &TabularDataset, parameters: &Parameters) -> CoreResult<Self> {
        let target = support::target_column(dataset, parameters, "target_column")?;
        let features = support::feature_columns(dataset, &[target.as_str()]);
        if features.is_empty() {
            return Err(CoreError::invalid_data(
                "regression needs at least one numeric predictor besides the target",
            ));
        }
        let mut names = vec![target.clone()];
        names.extend(features.iter().cloned());
        let (rows, _) = support::feature_matrix(dataset, &names, features.len() + 2)?;
        let y = rows.iter().map(|r| r[0]).collect();
        let x = rows.into_iter().map(|r| r[1..].to_vec()).collect();
        Ok(Self {
            target,
            features,
            x,
            y,
        })
    }

    /// Fit `rows` (without intercept column) against the target
    fn fit(&self, rows: &[Vec<f64>], ridge: f64) -> CoreResult<(Array1<f64>, Vec<f64>)> {
        let design = math::with_intercept(rows)?;
        let y = Array1::from_vec(self.y.clone());
        let beta = math::least_squares(&design, &y, ridge, true)?;
        let fitted = design.dot(&beta).to_vec();
        Ok((beta, fitted))
    }

    fn output(
        &self,
        summary: String,
        coefficient_names: &[String],
        beta: &Array1<f64>,
        fitted: &[f64],
    ) -> CapabilityOutput {
        let errors = math::error_summary(&self.y, fitted);
        let n = self.y.len() as f64;
        let p = coefficient_names.len() as f64;
        let adjusted_r2 = if n - p - 1.0 > 0.0 {
            1.0 - (1.0 - errors.r2) * (n - 1.0) / (n - p - 1.0)
        } else {
            errors.r2
        };

        let mut coefficients = Map::new();
        coefficients.insert("intercept".to_string(), json!(round_to(beta[0], 6)));
        for (name, value) in coefficient_names.iter().zip(beta.iter().skip(1)) {
            coefficients.insert(name.clone(), json!(round_to(*value, 6)));
        }

        CapabilityOutput::new(summary)
            .with_result("target_column", self.target.clone())
            .with_result("features", json!(self.features))
            .with_result("coefficients", Value::Object(coefficients))
            .with_metric("r2", errors.r2)
            .with_metric("adjusted_r2", adjusted_r2)
            .with_metric("mse", errors.mse)
            .with_metric("rmse", errors.rmse)
            .with_metric("mae", errors.mae)
            .with_metric("mean_target", math::mean(&self.y))
    }
}

fn fit_summary(kind: &str, target: &str, r2: f64) -> String {
    format!(
        "{} sobre '{}' explica el {:.1}% de la variabilidad (R² = {:.3}).",
        kind,
        target,
        (r2 * 100.0).max(0.0),
        r2
    )
}

pub struct LinearRegression;

impl Capability for LinearRegression {
    fn id(&self) -> &str {
        "linear_regression"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let design = Design::prepare(dataset, parameters)?;
        let (beta, fitted) = design.fit(&design.x, 0.0)?;
        let r2 = math::error_summary(&design.y, &fitted).r2;
        Ok(design.output(
            fit_summary("La regresión lineal", &design.target, r2),
            &design.features,
            &beta,
            &fitted,
        ))
    }
}

pub struct PolynomialRegression;

impl Capability for PolynomialRegression {
    fn id(&self) -> &str {
        "polynomial_regression"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let degree = parameters.usize_or("degree", 2);
        if !(1..=6).contains(&degree) {
            return Err(CoreError::validation("degree must be between 1 and 6"));
        }
        let design = Design::prepare(dataset, parameters)?;
        let scaler = Standardizer::fit(&design.x);
        let expanded: Vec<Vec<f64>> = scaler
            .transform(&design.x)
            .iter()
            .map(|row| {
                row.iter()
                    .flat_map(|v| (1..=degree).map(move |d| v.powi(d as i32)))
                    .collect()
            })
            .collect();
        let names: Vec<String> = design
            .features
            .iter()
            .flat_map(|f| {
                (1..=degree).map(move |d| if d == 1 { f.clone() } else { format!("{}^{}", f, d) })
            })
            .collect();

        let (beta, fitted) = design.fit(&expanded, 1e-8)?;
        let r2 = math::error_summary(&design.y, &fitted).r2;
        Ok(design
            .output(
                fit_summary(
                    &format!("La regresión polinómica de grado {}", degree),
                    &design.target,
                    r2,
                ),
                &names,
                &beta,
                &fitted,
            )
            .with_result("degree", degree)
            .with_result("standardized_inputs", true))
    }
}

pub struct RidgeRegression;

impl Capability for RidgeRegression {
    fn id(&self) -> &str {
        "ridge_regression"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let alpha = parameters.f64_or("alpha", 1.0);
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(CoreError::validation("alpha must be a non-negative number"));
        }
        let design = Design::prepare(dataset, parameters)?;
        let scaler = Standardizer::fit(&design.x);
        let (beta, fitted) = design.fit(&scaler.transform(&design.x), alpha)?;
        let r2 = math::error_summary(&design.y, &fitted).r2;
        Ok(design
            .output(
                fit_summary(&format!("La regresión Ridge (alpha = {})", alpha), &design.target, r2),
                &design.features,
                &beta,
                &fitted,
            )
            .with_result("alpha", alpha)
            .with_result("standardized_inputs", true))
    }
}
