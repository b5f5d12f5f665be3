//! Parameter Resolver
//!
//! Completes a caller's parameter map for one capability:
//!
//! 1. caller-supplied values are kept verbatim;
//! 2. missing column-role parameters are inferred from the dataset in the
//!    order date, group, label, target/value, each claiming its column;
//! 3. remaining recognized parameters take their documented defaults.
//!
//! Inference never fails. When no column qualifies it falls back to a
//! positional pick so execution can proceed.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use ml_analysis_core::{Parameters, TabularDataset};

use crate::models::capability::{ColumnRole, ParameterSpec};
use crate::services::registry::CapabilityRegistry;

/// Distinct-value window of a grouping or label column
const GROUP_MIN_DISTINCT: usize = 2;
const GROUP_MAX_DISTINCT: usize = 10;

/// Inference order of column roles
const ROLE_ORDER: [ColumnRole; 5] = [
    ColumnRole::Date,
    ColumnRole::Group,
    ColumnRole::Label,
    ColumnRole::Target,
    ColumnRole::Value,
];

#[derive(Debug, Clone)]
pub struct ParameterResolver {
    registry: Arc<CapabilityRegistry>,
}

impl ParameterResolver {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve parameters for `capability_id` against `dataset`.
    ///
    /// Unknown capabilities get the supplied map back unchanged.
    pub fn resolve(
        &self,
        capability_id: &str,
        supplied: &Parameters,
        dataset: &TabularDataset,
    ) -> Parameters {
        let Ok(descriptor) = self.registry.get(capability_id) else {
            return supplied.clone();
        };

        let mut resolved = supplied.clone();

        // Columns named by the caller are already taken
        let mut claimed: HashSet<String> = descriptor
            .parameters
            .iter()
            .filter(|spec| spec.role.is_some())
            .filter_map(|spec| resolved.get(&spec.name).and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        if dataset.column_count() > 0 {
            for role in ROLE_ORDER {
                for spec in descriptor.parameters.iter().filter(|s| s.role == Some(role)) {
                    if resolved.contains_key(&spec.name) {
                        continue;
                    }
                    let column = infer_column(dataset, role, &claimed);
                    debug!(
                        "Inferred {} = '{}' for {} ({:?} role)",
                        spec.name, column, capability_id, role
                    );
                    claimed.insert(column.clone());
                    resolved.insert(spec.name.clone(), Value::String(column));
                }
            }
        }

        for spec in &descriptor.parameters {
            apply_default(&mut resolved, spec);
        }

        resolved
    }
}

fn apply_default(resolved: &mut Parameters, spec: &ParameterSpec) {
    if resolved.contains_key(&spec.name) {
        return;
    }
    if let Some(default) = &spec.default {
        resolved.insert(spec.name.clone(), default.clone());
    }
}

/// Pick a column for `role`; the dataset must have at least one column
fn infer_column(dataset: &TabularDataset, role: ColumnRole, claimed: &HashSet<String>) -> String {
    let columns = dataset.columns();
    let unclaimed = || columns.iter().filter(|c| !claimed.contains(&c.name));
    let groupable = |distinct: usize| (GROUP_MIN_DISTINCT..=GROUP_MAX_DISTINCT).contains(&distinct);

    let chosen = match role {
        ColumnRole::Date => unclaimed()
            .find(|c| c.is_datetime())
            .or_else(|| columns.first()),
        ColumnRole::Group => unclaimed()
            .find(|c| groupable(c.distinct_count()))
            .or_else(|| columns.first()),
        ColumnRole::Label => unclaimed()
            .filter(|c| groupable(c.distinct_count()))
            .last()
            .or_else(|| columns.last()),
        ColumnRole::Target | ColumnRole::Value => unclaimed()
            .find(|c| c.is_numeric())
            .or_else(|| columns.get(1))
            .or_else(|| columns.first()),
    };

    chosen.map(|c| c.name.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ml_analysis_core::Column;
    use serde_json::json;

    fn resolver() -> ParameterResolver {
        ParameterResolver::new(Arc::new(CapabilityRegistry::builtin().unwrap()))
    }

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap_or_default()
    }

    fn grouped_dataset() -> TabularDataset {
        TabularDataset::new(vec![
            Column::numeric("id", (0..12).map(|i| Some(i as f64)).collect()),
            Column::text(
                "tratamiento",
                (0..12).map(|i| Some(["a", "b", "c"][i % 3].to_string())).collect(),
            ),
            Column::numeric("presion", (0..12).map(|i| Some(120.0 + i as f64)).collect()),
        ])
        .unwrap()
    }

    fn series_dataset() -> TabularDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        TabularDataset::new(vec![
            Column::numeric("ventas", (0..6).map(|i| Some(i as f64)).collect()),
            Column::datetime(
                "fecha",
                (0..6)
                    .map(|i| {
                        start
                            .checked_add_days(chrono::Days::new(i))
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
                    .collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_parameters() {
        let resolved = resolver().resolve("kmeans", &Parameters::new(), &grouped_dataset());
        assert_eq!(resolved["n_clusters"], json!(3));
        assert_eq!(resolved["random_state"], json!(42));
    }

    #[test]
    fn test_supplied_values_are_kept_verbatim() {
        let supplied = params(json!({"n_clusters": "5", "extra": true}));
        let resolved = resolver().resolve("kmeans", &supplied, &grouped_dataset());
        assert_eq!(resolved["n_clusters"], json!("5"));
        assert_eq!(resolved["extra"], json!(true));
    }

    #[test]
    fn test_group_then_value_inference() {
        let resolved = resolver().resolve("anova", &Parameters::new(), &grouped_dataset());
        assert_eq!(resolved["group_column"], json!("tratamiento"));
        // "id" has 12 distinct values so it is not a group, but it is numeric
        assert_eq!(resolved["value_column"], json!("id"));
    }

    #[test]
    fn test_caller_column_is_claimed() {
        let supplied = params(json!({"value_column": "presion"}));
        let resolved = resolver().resolve("anova", &supplied, &grouped_dataset());
        assert_eq!(resolved["value_column"], json!("presion"));
        assert_eq!(resolved["group_column"], json!("tratamiento"));
    }

    #[test]
    fn test_date_column_prefers_datetime_type() {
        let resolved = resolver().resolve("arima", &Parameters::new(), &series_dataset());
        assert_eq!(resolved["date_column"], json!("fecha"));
        assert_eq!(resolved["target_column"], json!("ventas"));
        assert_eq!(resolved["forecast_steps"], json!(12));
        assert_eq!(resolved["p"], json!(1));
    }

    #[test]
    fn test_sarima_seasonal_defaults() {
        let resolved = resolver().resolve("sarima", &Parameters::new(), &series_dataset());
        assert_eq!(resolved["s"], json!(12));
        assert_eq!(resolved["P"], json!(1));
        assert_eq!(resolved["D"], json!(1));
        assert_eq!(resolved["Q"], json!(1));
    }

    #[test]
    fn test_label_prefers_last_groupable_column() {
        let dataset = TabularDataset::new(vec![
            Column::numeric("x", (0..20).map(|i| Some(i as f64)).collect()),
            Column::text(
                "segmento",
                (0..20).map(|i| Some(["a", "b"][i % 2].to_string())).collect(),
            ),
            Column::numeric("y", (0..20).map(|i| Some((i * 3) as f64)).collect()),
        ])
        .unwrap();
        let resolved = resolver().resolve("random_forest", &Parameters::new(), &dataset);
        assert_eq!(resolved["target_column"], json!("segmento"));
    }

    #[test]
    fn test_positional_fallback_without_qualifying_columns() {
        let dataset = TabularDataset::new(vec![
            Column::text("a", vec![Some("x".into()); 4]),
            Column::text("b", vec![Some("y".into()); 4]),
        ])
        .unwrap();
        let resolved = resolver().resolve("anova", &Parameters::new(), &dataset);
        assert_eq!(resolved["group_column"], json!("a"));
        assert_eq!(resolved["value_column"], json!("b"));

        let resolved = resolver().resolve("arima", &Parameters::new(), &dataset);
        assert_eq!(resolved["date_column"], json!("a"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = resolver();
        let dataset = grouped_dataset();
        for id in ["anova", "kmeans", "random_forest", "linear_regression", "pca", "chi_square"] {
            let once = resolver.resolve(id, &Parameters::new(), &dataset);
            let twice = resolver.resolve(id, &once, &dataset);
            assert_eq!(once, twice, "{} not idempotent", id);
        }
    }

    #[test]
    fn test_unknown_capability_returns_map_unchanged() {
        let supplied = params(json!({"a": 1}));
        let resolved = resolver().resolve("does_not_exist", &supplied, &grouped_dataset());
        assert_eq!(resolved, supplied);
    }

    #[test]
    fn test_empty_dataset_skips_inference() {
        let resolved = resolver().resolve("anova", &Parameters::new(), &TabularDataset::default());
        assert!(!resolved.contains_key("group_column"));
        assert!(!resolved.contains_key("value_column"));
    }
}
