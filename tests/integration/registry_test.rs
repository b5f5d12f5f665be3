//! Registry Integration Tests
//!
//! Tests for the built-in catalog as seen by its consumers:
//! - Every registered id resolves to a real implementation
//! - Unknown ids resolve to the fallback
//! - Complementary lookups stay inside the catalog
//! - Parameter inference is idempotent for every capability

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use ml_analysis_core::{Category, Column, Parameters, TabularDataset};
use ml_analysis_service::models::analysis::FallbackReason;
use ml_analysis_service::services::loader::dataset_from_json;
use ml_analysis_service::services::recommendations::visualizations;
use ml_analysis_service::services::{CapabilityRegistry, CapabilityResolver, ParameterResolver};

// ============================================================================
// Helpers
// ============================================================================

fn registry() -> Arc<CapabilityRegistry> {
    Arc::new(CapabilityRegistry::builtin().expect("built-in catalog is valid"))
}

/// Dataset with a date, a grouping, two numeric and a label column
fn mixed_dataset() -> TabularDataset {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let rows = 36;
    TabularDataset::new(vec![
        Column::datetime(
            "fecha",
            (0..rows)
                .map(|i| {
                    start
                        .checked_add_days(chrono::Days::new(i * 30))
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .collect(),
        ),
        Column::text(
            "region",
            (0..rows).map(|i| Some(["norte", "sur", "este"][i as usize % 3].to_string())).collect(),
        ),
        Column::numeric("ventas", (0..rows).map(|i| Some(100.0 + i as f64 * 2.5)).collect()),
        Column::numeric("unidades", (0..rows).map(|i| Some((i * 7 % 13) as f64)).collect()),
        Column::text(
            "segmento",
            (0..rows).map(|i| Some(if i % 4 == 0 { "alto" } else { "bajo" }.to_string())).collect(),
        ),
    ])
    .unwrap()
}

// ============================================================================
// Resolution
// ============================================================================

/// Declared in the catalog without a native implementation
const DECLARED_ONLY: [&str; 5] = ["prophet", "lstm", "xgboost", "svm", "tsne"];

#[test]
fn test_every_known_id_resolves() {
    let registry = registry();
    let resolver = CapabilityResolver::builtin(Arc::clone(&registry), Some(1));

    for descriptor in registry.list() {
        let resolved = resolver.resolve(&descriptor.id);
        if DECLARED_ONLY.contains(&descriptor.id.as_str()) {
            assert!(matches!(
                resolved.fallback,
                Some(FallbackReason::ImplementationUnavailable(_))
            ));
            assert!(resolved.capability.is_fallback());
        } else {
            assert!(!resolved.is_fallback(), "{} fell back", descriptor.id);
            assert_eq!(resolved.capability.id(), descriptor.id);
            assert!(!resolved.capability.is_fallback());
        }
    }
}

#[test]
fn test_unknown_ids_resolve_to_fallback() {
    let resolver = CapabilityResolver::builtin(registry(), Some(1));

    for id in ["does_not_exist", "", "KMEANS", "randomForest"] {
        let resolved = resolver.resolve(id);
        assert_eq!(resolved.fallback, Some(FallbackReason::UnknownCapability));
        assert!(resolved.capability.is_fallback());
    }
}

// ============================================================================
// Catalog queries
// ============================================================================

#[test]
fn test_catalog_covers_every_category() {
    let registry = registry();
    assert_eq!(registry.len(), 21);
    for category in Category::ALL {
        assert!(!registry.by_category(category).is_empty(), "{:?} is empty", category);
    }
    assert_eq!(registry.by_category(Category::Clustering).len(), 3);
}

#[test]
fn test_industry_filter_is_inclusive() {
    let registry = registry();
    let salud: Vec<&str> = registry.by_industry("salud").iter().map(|d| d.id.as_str()).collect();
    assert!(salud.contains(&"anova"));
    assert!(!salud.contains(&"sarima"));
    assert!(registry.by_industry("mineria").is_empty());
}

#[test]
fn test_complementary_stays_inside_catalog() {
    let registry = registry();
    for descriptor in registry.list() {
        for industry in [None, Some("retail"), Some("salud"), Some("mineria")] {
            for suggestion in registry.complementary(&descriptor.id, industry) {
                assert_ne!(suggestion.id, descriptor.id);
                assert!(registry.contains(&suggestion.id));
                if let Some(industry) = industry {
                    assert!(suggestion.supports_industry(industry));
                }
            }
        }
    }
}

#[test]
fn test_sarima_links_follow_declaration_order() {
    let ids: Vec<String> = registry()
        .complementary("sarima", None)
        .into_iter()
        .map(|d| d.id.clone())
        .collect();
    assert_eq!(ids, vec!["arima", "exponential_smoothing", "prophet", "linear_regression"]);

    let salud: Vec<String> = registry()
        .complementary("pca", Some("salud"))
        .into_iter()
        .map(|d| d.id.clone())
        .collect();
    assert_eq!(salud, vec!["kmeans", "random_forest", "tsne"]);
}

#[test]
fn test_parameter_metadata_lists_every_spec() {
    let registry = registry();
    let metadata = registry.parameter_metadata("kmeans").unwrap();
    assert!(metadata.contains_key("n_clusters"));
    assert!(!metadata["n_clusters"].required);
    assert!(registry.parameter_metadata("does_not_exist").is_err());
}

#[test]
fn test_visualizations_are_total_and_fixed() {
    for category in Category::ALL.into_iter().map(Some).chain([None]) {
        let first = visualizations(category);
        assert!(!first.is_empty());
        assert_eq!(first, visualizations(category));
    }
}

// ============================================================================
// Parameter inference
// ============================================================================

#[test]
fn test_parameter_resolution_is_idempotent() {
    let registry = registry();
    let resolver = ParameterResolver::new(Arc::clone(&registry));
    let dataset = mixed_dataset();

    for descriptor in registry.list() {
        let once = resolver.resolve(&descriptor.id, &Parameters::new(), &dataset);
        let twice = resolver.resolve(&descriptor.id, &once, &dataset);
        assert_eq!(once, twice, "{} is not idempotent", descriptor.id);
        for spec in &descriptor.parameters {
            assert!(once.contains_key(&spec.name), "{} missing {}", descriptor.id, spec.name);
        }
    }
}

#[test]
fn test_inference_picks_columns_by_role() {
    let resolver = ParameterResolver::new(registry());
    let dataset = mixed_dataset();

    let sarima = resolver.resolve("sarima", &Parameters::new(), &dataset);
    assert_eq!(sarima["date_column"], json!("fecha"));
    assert_eq!(sarima["target_column"], json!("ventas"));

    let anova = resolver.resolve("anova", &Parameters::new(), &dataset);
    assert_eq!(anova["group_column"], json!("region"));
    assert_eq!(anova["value_column"], json!("ventas"));
}

#[test]
fn test_inference_on_json_keeps_file_column_order() {
    let dataset = dataset_from_json(
        r#"[
            {"ventas": 10, "coste": 3},
            {"ventas": 14, "coste": 4},
            {"ventas": 19, "coste": 6}
        ]"#,
    )
    .unwrap();

    let resolver = ParameterResolver::new(registry());
    let resolved = resolver.resolve("linear_regression", &Parameters::new(), &dataset);
    assert_eq!(resolved["target_column"], json!("ventas"));
}

#[test]
fn test_supplied_values_win_over_inference() {
    let resolver = ParameterResolver::new(registry());
    let mut supplied = Parameters::new();
    supplied.insert("value_column".into(), json!("unidades"));
    supplied.insert("group_column".into(), json!("segmento"));

    let resolved = resolver.resolve("t_test", &supplied, &mixed_dataset());
    assert_eq!(resolved["value_column"], json!("unidades"));
    assert_eq!(resolved["group_column"], json!("segmento"));
}
