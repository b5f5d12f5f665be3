//! Time Series Capabilities
//!
//! - `Arima` - ARIMA(p, d, q)
//! - `Sarima` - seasonal ARIMA(p, d, q)(P, D, Q, s)
//! - `ExponentialSmoothing` - Holt's linear trend method
//!
//! ARMA coefficients are estimated with the Hannan-Rissanen two-stage
//! regression: a long autoregression supplies residual estimates, then the
//! series is regressed on its own lags and the lagged residual estimates.
//! Forecasts are produced on the differenced scale and integrated back.

use chrono::NaiveDateTime;
use ndarray::Array1;
use serde_json::{json, Value};
use tracing::debug;

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to};
use crate::support;

/// Fitted ARMA model on an already-differenced series
#[derive(Debug, Clone)]
struct ArmaFit {
    intercept: f64,
    ar_lags: Vec<usize>,
    ar: Vec<f64>,
    ma_lags: Vec<usize>,
    ma: Vec<f64>,
    /// One residual per observation; zero before `start`
    residuals: Vec<f64>,
    start: usize,
}

impl ArmaFit {
    fn parameter_count(&self) -> usize {
        1 + self.ar.len() + self.ma.len()
    }

    fn predict_at(&self, series: &[f64], residuals: &[f64], t: usize) -> f64 {
        let mut value = self.intercept;
        for (coef, lag) in self.ar.iter().zip(&self.ar_lags) {
            value += coef * series[t - lag];
        }
        for (coef, lag) in self.ma.iter().zip(&self.ma_lags) {
            value += coef * residuals[t - lag];
        }
        value
    }

    fn forecast(&self, series: &[f64], steps: usize) -> Vec<f64> {
        let mut extended = series.to_vec();
        let mut residuals = self.residuals.clone();
        for _ in 0..steps {
            let t = extended.len();
            let next = self.predict_at(&extended, &residuals, t);
            extended.push(next);
            residuals.push(0.0);
        }
        extended[series.len()..].to_vec()
    }

    /// Residuals from `start` onward
    fn active_residuals(&self) -> &[f64] {
        &self.residuals[self.start..]
    }
}

fn regress_lags(
    series: &[f64],
    residuals: Option<&[f64]>,
    ar_lags: &[usize],
    ma_lags: &[usize],
    start: usize,
) -> CoreResult<Array1<f64>> {
    let rows: Vec<Vec<f64>> = (start..series.len())
        .map(|t| {
            let mut row: Vec<f64> = ar_lags.iter().map(|l| series[t - l]).collect();
            if let Some(res) = residuals {
                row.extend(ma_lags.iter().map(|l| res[t - l]));
            }
            row
        })
        .collect();
    let x = math::with_intercept(&rows)?;
    let y = Array1::from_iter(series[start..].iter().copied());
    math::least_squares(&x, &y, 1e-8, true)
}

fn fit_arma(series: &[f64], ar_lags: Vec<usize>, ma_lags: Vec<usize>) -> CoreResult<ArmaFit> {
    let max_ar = ar_lags.iter().copied().max().unwrap_or(0);
    let max_ma = ma_lags.iter().copied().max().unwrap_or(0);
    let n = series.len();
    let coefficients = ar_lags.len() + ma_lags.len() + 1;

    let (beta, start) = if ma_lags.is_empty() {
        if n < max_ar + coefficients + 2 {
            return Err(CoreError::invalid_data(format!(
                "series of length {} is too short for the requested model",
                n
            )));
        }
        (regress_lags(series, None, &ar_lags, &[], max_ar)?, max_ar)
    } else {
        // Stage one: long autoregression to estimate the innovations
        let long_order = (max_ar.max(max_ma) + 4).min(n / 3);
        let start = long_order + max_ar.max(max_ma);
        if long_order == 0 || n < start + coefficients + 2 {
            return Err(CoreError::invalid_data(format!(
                "series of length {} is too short for the requested model",
                n
            )));
        }
        let long_lags: Vec<usize> = (1..=long_order).collect();
        let long_beta = regress_lags(series, None, &long_lags, &[], long_order)?;
        let mut innovations = vec![0.0; n];
        for t in long_order..n {
            let mut predicted = long_beta[0];
            for (i, lag) in long_lags.iter().enumerate() {
                predicted += long_beta[i + 1] * series[t - lag];
            }
            innovations[t] = series[t] - predicted;
        }
        // Stage two: regression on own lags and lagged innovations
        let beta = regress_lags(series, Some(&innovations), &ar_lags, &ma_lags, start)?;
        (beta, start)
    };

    let ar = beta.iter().skip(1).take(ar_lags.len()).copied().collect();
    let ma = beta.iter().skip(1 + ar_lags.len()).copied().collect();
    let mut fit = ArmaFit {
        intercept: beta[0],
        ar_lags,
        ar,
        ma_lags,
        ma,
        residuals: vec![0.0; n],
        start,
    };

    let mut residuals = vec![0.0; n];
    for t in start..n {
        residuals[t] = series[t] - fit.predict_at(series, &residuals, t);
    }
    fit.residuals = residuals;
    Ok(fit)
}

/// Stack of differencing operations that can be undone for forecasts
struct Differencing {
    /// (lag, series before the difference was applied)
    steps: Vec<(usize, Vec<f64>)>,
}

impl Differencing {
    fn apply(series: &[f64], lags: &[usize]) -> CoreResult<(Self, Vec<f64>)> {
        let mut current = series.to_vec();
        let mut steps = Vec::new();
        for &lag in lags {
            if current.len() <= lag + 2 {
                return Err(CoreError::invalid_data(
                    "series is too short for the requested differencing",
                ));
            }
            let next: Vec<f64> = (lag..current.len())
                .map(|t| current[t] - current[t - lag])
                .collect();
            steps.push((lag, current));
            current = next;
        }
        Ok((Self { steps }, current))
    }

    /// Number of leading observations consumed by differencing
    fn offset(&self) -> usize {
        self.steps.iter().map(|(lag, _)| lag).sum()
    }

    fn integrate(&self, forecasts: &[f64]) -> Vec<f64> {
        let mut values = forecasts.to_vec();
        for (lag, before) in self.steps.iter().rev() {
            let mut extended = before.clone();
            for diff in &values {
                let base = extended[extended.len() - lag];
                extended.push(diff + base);
            }
            values = extended[before.len()..].to_vec();
        }
        values
    }
}

fn target_series(
    dataset: &TabularDataset,
    parameters: &Parameters,
) -> CoreResult<(String, Vec<f64>)> {
    let target = support::target_column(dataset, parameters, "target_column")?;
    let values = dataset.numeric_values(&target)?;
    if values.len() < 4 {
        return Err(CoreError::invalid_data(format!(
            "column '{}' has too few observations for a time series model",
            target
        )));
    }
    Ok((target, values))
}

/// Dates for forecast steps, continuing the cadence of the date column
fn forecast_dates(
    dataset: &TabularDataset,
    parameters: &Parameters,
    steps: usize,
) -> Option<Vec<String>> {
    let name = parameters.get_str("date_column")?;
    let column = dataset.column(name)?;
    let ml_analysis_core::ColumnData::DateTime(values) = &column.data else {
        return None;
    };
    let dates: Vec<NaiveDateTime> = values.iter().flatten().copied().collect();
    if dates.len() < 2 {
        return None;
    }
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .collect();
    gaps.sort_unstable();
    let step = chrono::Duration::seconds(gaps[gaps.len() / 2]);
    let last = *dates.last()?;
    Some(
        (1..=steps as i32)
            .map(|i| (last + step * i).format("%Y-%m-%d").to_string())
            .collect(),
    )
}

fn rounded(values: &[f64]) -> Value {
    json!(values.iter().map(|v| round_to(*v, 4)).collect::<Vec<_>>())
}

fn arima_like(
    dataset: &TabularDataset,
    parameters: &Parameters,
    order: (usize, usize, usize),
    seasonal: Option<(usize, usize, usize, usize)>,
) -> CoreResult<(String, Vec<f64>, ArmaFit, Differencing, Vec<f64>)> {
    let (target, series) = target_series(dataset, parameters)?;
    let (p, d, q) = order;

    let mut diff_lags = Vec::new();
    let mut ar_lags: Vec<usize> = (1..=p).collect();
    let mut ma_lags: Vec<usize> = (1..=q).collect();
    if let Some((sp, sd, sq, s)) = seasonal {
        if s < 2 {
            return Err(CoreError::validation("seasonal period must be at least 2"));
        }
        diff_lags.extend(std::iter::repeat(s).take(sd));
        ar_lags.extend((1..=sp).map(|i| i * s));
        ma_lags.extend((1..=sq).map(|i| i * s));
    }
    diff_lags.extend(std::iter::repeat(1).take(d));

    let (differencing, differenced) = Differencing::apply(&series, &diff_lags)?;
    debug!(
        "Fitting ARMA on {} differenced observations (ar lags {:?}, ma lags {:?})",
        differenced.len(),
        ar_lags,
        ma_lags
    );
    let fit = fit_arma(&differenced, ar_lags, ma_lags)?;
    Ok((target, series, fit, differencing, differenced))
}

/// Common metrics for an ARMA fit expressed on the original scale
fn arma_metrics(
    series: &[f64],
    fit: &ArmaFit,
    differencing: &Differencing,
    output: CapabilityOutput,
) -> CapabilityOutput {
    let residuals = fit.active_residuals();
    let offset = differencing.offset() + fit.start;
    let actual = &series[offset..];
    let fitted: Vec<f64> = actual.iter().zip(residuals).map(|(a, e)| a - e).collect();
    let errors = math::error_summary(actual, &fitted);

    let n = residuals.len().max(1) as f64;
    let sse: f64 = residuals.iter().map(|e| e * e).sum();
    let k = fit.parameter_count() as f64;
    let log_term = n * (sse / n).max(1e-12).ln();

    output
        .with_metric("aic", log_term + 2.0 * k)
        .with_metric("bic", log_term + k * n.ln())
        .with_metric("rmse", errors.rmse)
        .with_metric("mae", errors.mae)
        .with_metric("mape", errors.mape)
        .with_metric("residual_autocorrelation", math::lag1_autocorrelation(residuals))
}

pub struct Arima;

impl Capability for Arima {
    fn id(&self) -> &str {
        "arima"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let order = (
            parameters.usize_or("p", 1),
            parameters.usize_or("d", 1),
            parameters.usize_or("q", 1),
        );
        let steps = parameters.usize_or("forecast_steps", 12).max(1);
        let (target, series, fit, differencing, differenced) =
            arima_like(dataset, parameters, order, None)?;

        let forecast = differencing.integrate(&fit.forecast(&differenced, steps));
        let mut output = CapabilityOutput::new(format!(
            "El análisis ARIMA({},{},{}) sobre '{}' ha detectado la tendencia de la serie y \
             proyecta {} periodos.",
            order.0, order.1, order.2, target, steps
        ))
        .with_result("target_column", target.clone())
        .with_result("forecast", rounded(&forecast))
        .with_result(
            "coefficients",
            json!({ "intercept": fit.intercept, "ar": fit.ar, "ma": fit.ma }),
        );
        if let Some(dates) = forecast_dates(dataset, parameters, steps) {
            output = output.with_result("dates", json!(dates));
        }
        Ok(arma_metrics(&series, &fit, &differencing, output))
    }
}

pub struct Sarima;

impl Capability for Sarima {
    fn id(&self) -> &str {
        "sarima"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let order = (
            parameters.usize_or("p", 1),
            parameters.usize_or("d", 1),
            parameters.usize_or("q", 1),
        );
        let seasonal = (
            parameters.usize_or("P", 1),
            parameters.usize_or("D", 1),
            parameters.usize_or("Q", 1),
            parameters.usize_or("s", 12),
        );
        let steps = parameters.usize_or("forecast_steps", 12).max(1);
        let (target, series, fit, differencing, differenced) =
            arima_like(dataset, parameters, order, Some(seasonal))?;

        let forecast = differencing.integrate(&fit.forecast(&differenced, steps));

        // Seasonal profile: mean deviation from the overall mean per position in the cycle
        let s = seasonal.3;
        let overall = math::mean(&series);
        let profile: Vec<f64> = (0..s)
            .map(|pos| {
                let values: Vec<f64> = series.iter().skip(pos).step_by(s).copied().collect();
                math::mean(&values) - overall
            })
            .collect();

        let mut output = CapabilityOutput::new(format!(
            "Análisis SARIMA completado con éxito. Se ha modelado una estacionalidad de período {} \
             en '{}'.",
            s, target
        ))
        .with_result("target_column", target.clone())
        .with_result("forecast", rounded(&forecast))
        .with_result(
            "seasonal_components",
            json!({
                "seasonal": rounded(&profile),
                "residual": rounded(fit.active_residuals()),
            }),
        )
        .with_result(
            "coefficients",
            json!({ "intercept": fit.intercept, "ar": fit.ar, "ma": fit.ma }),
        );
        if let Some(dates) = forecast_dates(dataset, parameters, steps) {
            output = output.with_result("dates", json!(dates));
        }
        Ok(arma_metrics(&series, &fit, &differencing, output))
    }
}

pub struct ExponentialSmoothing;

impl Capability for ExponentialSmoothing {
    fn id(&self) -> &str {
        "exponential_smoothing"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let alpha = parameters.f64_or("alpha", 0.3);
        let beta = parameters.f64_or("beta", 0.1);
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return Err(CoreError::validation("alpha and beta must lie in [0, 1]"));
        }
        let steps = parameters.usize_or("forecast_steps", 12).max(1);
        let (target, series) = target_series(dataset, parameters)?;

        let mut level = series[0];
        let mut trend = series[1] - series[0];
        let mut fitted = Vec::with_capacity(series.len() - 1);
        for &value in &series[1..] {
            let prediction = level + trend;
            fitted.push(prediction);
            let previous_level = level;
            level = alpha * value + (1.0 - alpha) * (level + trend);
            trend = beta * (level - previous_level) + (1.0 - beta) * trend;
        }
        let forecast: Vec<f64> = (1..=steps).map(|h| level + trend * h as f64).collect();

        let actual = &series[1..];
        let errors = math::error_summary(actual, &fitted);
        let residuals: Vec<f64> = actual.iter().zip(&fitted).map(|(a, f)| a - f).collect();

        let mut output = CapabilityOutput::new(format!(
            "Suavizado exponencial de Holt aplicado a '{}'. Tendencia estimada de {:.2} por \
             periodo.",
            target, trend
        ))
        .with_result("target_column", target.clone())
        .with_result("forecast", rounded(&forecast))
        .with_result("components", json!({ "level": level, "trend": trend }));
        if let Some(dates) = forecast_dates(dataset, parameters, steps) {
            output = output.with_result("dates", json!(dates));
        }

        Ok(output
            .with_metric("rmse", errors.rmse)
            .with_metric("mae", errors.mae)
            .with_metric("mape", errors.mape)
            .with_metric("residual_autocorrelation", math::lag1_autocorrelation(&residuals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_analysis_core::Column;

    fn series_dataset(values: Vec<f64>) -> TabularDataset {
        TabularDataset::new(vec![Column::numeric(
            "ventas",
            values.into_iter().map(Some).collect(),
        )])
        .unwrap()
    }

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_differencing_round_trip() {
        let series = vec![1.0, 3.0, 6.0, 10.0, 15.0, 21.0];
        let (diff, differenced) = Differencing::apply(&series, &[1]).unwrap();
        assert_eq!(differenced, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        // Next differences 7 and 8 integrate to 28 and 36
        assert_eq!(diff.integrate(&[7.0, 8.0]), vec![28.0, 36.0]);
    }

    #[test]
    fn test_arima_on_linear_trend_forecasts_continuation() {
        let values: Vec<f64> = (0..40)
            .map(|i| 100.0 + 2.0 * i as f64 + (i % 3) as f64 * 0.1)
            .collect();
        let output = Arima
            .analyze(
                &series_dataset(values),
                "retail",
                &params(json!({
                    "target_column": "ventas",
                    "p": 1,
                    "d": 1,
                    "q": 0,
                    "forecast_steps": 3
                })),
            )
            .unwrap();
        let forecast = output.result["forecast"].as_array().unwrap();
        assert_eq!(forecast.len(), 3);
        let first = forecast[0].as_f64().unwrap();
        assert!(first > 175.0 && first < 185.0, "forecast {}", first);
        assert!(output.metric("aic").is_some());
        assert!(output.metric("rmse").unwrap() < 1.0);
    }

    #[test]
    fn test_arima_rejects_short_series() {
        let result = Arima.analyze(
            &series_dataset(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            "retail",
            &params(json!({"target_column": "ventas", "p": 2, "d": 1, "q": 2})),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_sarima_seasonal_series() {
        let values: Vec<f64> = (0..72)
            .map(|i| {
                let phase = (i % 12) as f64 / 12.0 * std::f64::consts::TAU;
                50.0 + i as f64 * 0.5 + 10.0 * phase.sin()
            })
            .collect();
        let output = Sarima
            .analyze(
                &series_dataset(values),
                "manufactura",
                &params(json!({
                    "target_column": "ventas",
                    "p": 1, "d": 1, "q": 0,
                    "P": 1, "D": 1, "Q": 0,
                    "s": 12
                })),
            )
            .unwrap();
        assert_eq!(output.result["forecast"].as_array().unwrap().len(), 12);
        assert_eq!(
            output.result["seasonal_components"]["seasonal"].as_array().unwrap().len(),
            12
        );
        assert!(output.metric("mape").is_some());
    }

    #[test]
    fn test_exponential_smoothing_tracks_trend() {
        let values: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let output = ExponentialSmoothing
            .analyze(
                &series_dataset(values),
                "retail",
                &params(json!({
                    "target_column": "ventas",
                    "alpha": 0.5,
                    "beta": 0.3,
                    "forecast_steps": 2
                })),
            )
            .unwrap();
        let forecast = output.result["forecast"].as_array().unwrap();
        assert!((forecast[0].as_f64().unwrap() - 40.0).abs() < 1.0);
        assert!(output.metric("mape").unwrap() < 5.0);
    }

    #[test]
    fn test_exponential_smoothing_rejects_bad_alpha() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let result = ExponentialSmoothing.analyze(
            &series_dataset(values),
            "retail",
            &params(json!({"target_column": "ventas", "alpha": 2.0})),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
