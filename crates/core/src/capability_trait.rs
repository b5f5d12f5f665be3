//! Capability Trait
//!
//! Defines the single interface every analysis technique implements:
//!
//! - `Capability` - identity plus `analyze(dataset, industry, parameters)`
//! - `CapabilityOutput` - the (result, metrics) document pair
//! - `Category` - the fixed family a capability belongs to
//! - `ParamsExt` - typed accessors over the untyped parameter map
//!
//! Implementations are plain objects registered once at process start and
//! shared as `Arc<dyn Capability>`; dispatch is a table lookup, never
//! reflection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::TabularDataset;
use crate::error::CoreResult;

/// Untyped parameter mapping supplied by callers
pub type Parameters = Map<String, Value>;

/// Capability family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TimeSeries,
    Classification,
    Clustering,
    Statistical,
    Regression,
    DimensionalityReduction,
}

impl Category {
    /// All categories in declaration order
    pub const ALL: [Category; 6] = [
        Category::TimeSeries,
        Category::Classification,
        Category::Clustering,
        Category::Statistical,
        Category::Regression,
        Category::DimensionalityReduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TimeSeries => "time_series",
            Category::Classification => "classification",
            Category::Clustering => "clustering",
            Category::Statistical => "statistical",
            Category::Regression => "regression",
            Category::DimensionalityReduction => "dimensionality_reduction",
        }
    }

    /// Parse a snake_case category tag
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Primary result document plus metrics document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOutput {
    /// Capability-specific structure; always carries a `summary` string
    pub result: Map<String, Value>,
    /// Flat map of metric name to number
    pub metrics: Map<String, Value>,
}

impl CapabilityOutput {
    /// Start an output with the given summary line
    pub fn new(summary: impl Into<String>) -> Self {
        let mut result = Map::new();
        result.insert("summary".to_string(), Value::String(summary.into()));
        Self {
            result,
            metrics: Map::new(),
        }
    }

    /// Add a field to the result document
    pub fn with_result(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.result.insert(key.to_string(), value.into());
        self
    }

    /// Add a numeric metric
    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), Value::from(value));
        self
    }

    pub fn summary(&self) -> Option<&str> {
        self.result.get("summary").and_then(Value::as_str)
    }

    /// Metric as `f64`, `None` when absent or not a number
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(Value::as_f64)
    }
}

/// A single analysis technique
pub trait Capability: Send + Sync {
    /// Registry identifier this implementation serves (e.g., "kmeans")
    fn id(&self) -> &str;

    /// Run the analysis. Implementations return `Err` rather than
    /// fabricating output when the data does not support the technique.
    fn analyze(
        &self,
        dataset: &TabularDataset,
        industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput>;

    /// Whether this is the synthetic fallback implementation
    fn is_fallback(&self) -> bool {
        false
    }
}

/// Typed accessors over `Parameters`.
///
/// Numbers supplied as strings ("3") are accepted, since parameters often
/// arrive from form fields.
pub trait ParamsExt {
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_f64(&self, key: &str) -> Option<f64>;

    fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_f64(key)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as usize)
    }

    fn usize_or(&self, key: &str, default: usize) -> usize {
        self.get_usize(key).unwrap_or(default)
    }

    fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }
}

impl ParamsExt for Parameters {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
