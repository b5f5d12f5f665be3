//! ML Analysis Capabilities
//!
//! Concrete implementations of the `Capability` trait, one per catalog
//! entry, plus the synthetic `Fallback`.
//!
//! ## Modules
//! - `time_series` - ARIMA, SARIMA, exponential smoothing
//! - `classification` - random forest, logistic regression, naive Bayes
//! - `clustering` - k-means, hierarchical, DBSCAN
//! - `statistical` - ANOVA, t-test, chi-squared
//! - `regression` - linear, polynomial, ridge
//! - `dimensionality` - PCA
//! - `fallback` - synthetic output when nothing else applies

pub mod classification;
pub mod clustering;
pub mod dimensionality;
pub mod fallback;
pub mod math;
pub mod regression;
pub mod statistical;
pub mod support;
pub mod time_series;

use std::sync::Arc;

use ml_analysis_core::{Capability, CoreResult};

// ── Re-exports ──────────────────────────────────────────────────────────
pub use classification::{LogisticRegression, NaiveBayes, RandomForest};
pub use clustering::{Dbscan, Hierarchical, KMeans};
pub use dimensionality::Pca;
pub use fallback::{monthly_dates, Fallback, FALLBACK_ID, FALLBACK_SUMMARY, FORECAST_MEAN};
pub use regression::{LinearRegression, PolynomialRegression, RidgeRegression};
pub use statistical::{Anova, ChiSquare, TTest};
pub use time_series::{Arima, ExponentialSmoothing, Sarima};

/// Constructor for a capability implementation. Factories may fail when an
/// implementation cannot be instantiated in the current environment.
pub type CapabilityFactory = fn() -> CoreResult<Arc<dyn Capability>>;

fn ready<C: Capability + 'static>(capability: C) -> CoreResult<Arc<dyn Capability>> {
    Ok(Arc::new(capability))
}

fn entry(id: &'static str, factory: CapabilityFactory) -> (&'static str, CapabilityFactory) {
    (id, factory)
}

/// Factories for every built-in capability, keyed by registry id
pub fn builtin_factories() -> Vec<(&'static str, CapabilityFactory)> {
    vec![
        entry("sarima", || ready(Sarima)),
        entry("arima", || ready(Arima)),
        entry("exponential_smoothing", || ready(ExponentialSmoothing)),
        entry("random_forest", || ready(RandomForest)),
        entry("logistic_regression", || ready(LogisticRegression)),
        entry("naive_bayes", || ready(NaiveBayes)),
        entry("kmeans", || ready(KMeans)),
        entry("hierarchical", || ready(Hierarchical)),
        entry("dbscan", || ready(Dbscan)),
        entry("anova", || ready(Anova)),
        entry("t_test", || ready(TTest)),
        entry("chi_square", || ready(ChiSquare)),
        entry("linear_regression", || ready(LinearRegression)),
        entry("polynomial_regression", || ready(PolynomialRegression)),
        entry("ridge_regression", || ready(RidgeRegression)),
        entry("pca", || ready(Pca)),
    ]
}
