//! Statistical Test Capabilities
//!
//! - `Anova` - one-way analysis of variance of `value_column` across `group_column`
//! - `TTest` - Welch's two-sample t-test between the first two groups
//! - `ChiSquare` - chi-squared test of independence between two categorical columns
//!
//! P-values come from the F, Student-t and chi-squared distributions in
//! `statrs`.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to};
use crate::support;

/// Significance level used for the textual verdict
const ALPHA: f64 = 0.05;

/// Numeric values of `value_column` grouped by the keys of `group_column`
fn grouped_values(
    dataset: &TabularDataset,
    parameters: &Parameters,
) -> CoreResult<(String, String, BTreeMap<String, Vec<f64>>)> {
    let value_name = support::target_column(dataset, parameters, "value_column")?;
    let group_name = support::required_column(dataset, parameters, "group_column")?;
    if value_name == group_name {
        return Err(CoreError::validation(
            "value_column and group_column must be different columns",
        ));
    }
    let values = dataset
        .require_column(&value_name)?
        .as_numeric()
        .ok_or_else(|| CoreError::invalid_data(format!("column '{}' is not numeric", value_name)))?;
    let groups = dataset.require_column(&group_name)?;

    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let (Some(value), Some(key)) = (value.filter(|v| v.is_finite()), groups.key_at(row)) else {
            continue;
        };
        grouped.entry(key).or_default().push(value);
    }
    if grouped.len() < 2 {
        return Err(CoreError::invalid_data(format!(
            "column '{}' must contain at least two groups",
            group_name
        )));
    }
    Ok((value_name, group_name, grouped))
}

fn verdict(p_value: f64) -> &'static str {
    if p_value < ALPHA {
        "estadísticamente significativas"
    } else {
        "no significativas"
    }
}

fn rounded_map(entries: impl IntoIterator<Item = (String, f64)>) -> Value {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key, json!(round_to(value, 4)));
    }
    Value::Object(map)
}

pub struct Anova;

impl Capability for Anova {
    fn id(&self) -> &str {
        "anova"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let (value_name, group_name, grouped) = grouped_values(dataset, parameters)?;
        let all: Vec<f64> = grouped.values().flatten().copied().collect();
        let n = all.len();
        let k = grouped.len();
        if n <= k {
            return Err(CoreError::invalid_data(
                "not enough observations for the number of groups",
            ));
        }

        let grand_mean = math::mean(&all);
        let ss_between: f64 = grouped
            .values()
            .map(|g| g.len() as f64 * (math::mean(g) - grand_mean).powi(2))
            .sum();
        let ss_within: f64 = grouped
            .values()
            .map(|g| {
                let m = math::mean(g);
                g.iter().map(|v| (v - m).powi(2)).sum::<f64>()
            })
            .sum();
        let df_between = (k - 1) as f64;
        let df_within = (n - k) as f64;
        if ss_within <= 0.0 {
            return Err(CoreError::computation("zero variance within groups"));
        }
        let f_statistic = (ss_between / df_between) / (ss_within / df_within);
        let distribution = FisherSnedecor::new(df_between, df_within)
            .map_err(|e| CoreError::computation(format!("F distribution: {}", e)))?;
        let p_value = 1.0 - distribution.cdf(f_statistic);
        let eta_squared = ss_between / (ss_between + ss_within);

        Ok(CapabilityOutput::new(format!(
            "ANOVA de '{}' entre {} grupos de '{}': las diferencias son {} (F = {:.2}, p = {:.4}).",
            value_name,
            k,
            group_name,
            verdict(p_value),
            f_statistic,
            p_value
        ))
        .with_result("value_column", value_name)
        .with_result("group_column", group_name)
        .with_result(
            "group_means",
            rounded_map(grouped.iter().map(|(g, v)| (g.clone(), math::mean(v)))),
        )
        .with_result("significant", p_value < ALPHA)
        .with_metric("f_statistic", f_statistic)
        .with_metric("p_value", p_value)
        .with_metric("eta_squared", eta_squared)
        .with_metric("df_between", df_between)
        .with_metric("df_within", df_within))
    }
}

pub struct TTest;

impl Capability for TTest {
    fn id(&self) -> &str {
        "t_test"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let (value_name, group_name, grouped) = grouped_values(dataset, parameters)?;
        let mut groups = grouped.iter();
        let (Some((name_a, a)), Some((name_b, b))) = (groups.next(), groups.next()) else {
            return Err(CoreError::invalid_data("two groups are required"));
        };
        if a.len() < 2 || b.len() < 2 {
            return Err(CoreError::invalid_data(
                "each group needs at least two observations",
            ));
        }

        let (va, vb) = (math::sample_variance(a), math::sample_variance(b));
        let (na, nb) = (a.len() as f64, b.len() as f64);
        let se2 = va / na + vb / nb;
        if se2 <= 0.0 {
            return Err(CoreError::computation("both groups have zero variance"));
        }
        let t_statistic = (math::mean(a) - math::mean(b)) / se2.sqrt();
        // Welch-Satterthwaite degrees of freedom
        let df = se2.powi(2)
            / ((va / na).powi(2) / (na - 1.0) + (vb / nb).powi(2) / (nb - 1.0));
        let distribution = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| CoreError::computation(format!("t distribution: {}", e)))?;
        let p_value = 2.0 * (1.0 - distribution.cdf(t_statistic.abs()));
        let pooled_sd = (((na - 1.0) * va + (nb - 1.0) * vb) / (na + nb - 2.0)).sqrt();
        let cohens_d = if pooled_sd > 0.0 {
            (math::mean(a) - math::mean(b)) / pooled_sd
        } else {
            0.0
        };

        let mut output = CapabilityOutput::new(format!(
            "Prueba t de Welch sobre '{}' entre '{}' y '{}': diferencia de medias {} (t = {:.2}, p \
             = {:.4}).",
            value_name,
            name_a,
            name_b,
            verdict(p_value),
            t_statistic,
            p_value
        ))
        .with_result("value_column", value_name)
        .with_result("group_column", group_name)
        .with_result("groups", json!([name_a, name_b]))
        .with_result(
            "group_means",
            rounded_map([(name_a.clone(), math::mean(a)), (name_b.clone(), math::mean(b))]),
        )
        .with_result("significant", p_value < ALPHA);
        if grouped.len() > 2 {
            output = output.with_result("ignored_groups", grouped.len() - 2);
        }
        Ok(output
            .with_metric("t_statistic", t_statistic)
            .with_metric("p_value", p_value)
            .with_metric("df", df)
            .with_metric("cohens_d", cohens_d))
    }
}

pub struct ChiSquare;

impl Capability for ChiSquare {
    fn id(&self) -> &str {
        "chi_square"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let row_name = support::required_column(dataset, parameters, "group_column")?;
        let col_name = support::required_column(dataset, parameters, "target_column")?;
        if row_name == col_name {
            return Err(CoreError::validation(
                "group_column and target_column must be different columns",
            ));
        }
        let rows_col = dataset.require_column(&row_name)?;
        let cols_col = dataset.require_column(&col_name)?;

        let mut table: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        let mut column_keys: Vec<String> = Vec::new();
        for row in 0..dataset.row_count() {
            let (Some(r), Some(c)) = (rows_col.key_at(row), cols_col.key_at(row)) else {
                continue;
            };
            if !column_keys.contains(&c) {
                column_keys.push(c.clone());
            }
            *table.entry(r).or_default().entry(c).or_insert(0.0) += 1.0;
        }
        column_keys.sort();
        if table.len() < 2 || column_keys.len() < 2 {
            return Err(CoreError::invalid_data(
                "both columns need at least two categories",
            ));
        }

        let total: f64 = table.values().flat_map(|r| r.values()).sum();
        let row_totals: Vec<f64> = table.values().map(|r| r.values().sum()).collect();
        let col_totals: Vec<f64> = column_keys
            .iter()
            .map(|c| table.values().map(|r| r.get(c).copied().unwrap_or(0.0)).sum())
            .collect();

        let mut chi_square = 0.0;
        for (i, row) in table.values().enumerate() {
            for (j, key) in column_keys.iter().enumerate() {
                let expected = row_totals[i] * col_totals[j] / total;
                let observed = row.get(key).copied().unwrap_or(0.0);
                chi_square += (observed - expected).powi(2) / expected;
            }
        }
        let (r, c) = (table.len(), column_keys.len());
        let dof = ((r - 1) * (c - 1)) as f64;
        let distribution = ChiSquared::new(dof)
            .map_err(|e| CoreError::computation(format!("chi-squared distribution: {}", e)))?;
        let p_value = 1.0 - distribution.cdf(chi_square);
        let cramers_v = (chi_square / (total * (r.min(c) - 1) as f64)).sqrt();

        let contingency: Map<String, Value> = table
            .iter()
            .map(|(k, row)| {
                let counts: Map<String, Value> = column_keys
                    .iter()
                    .map(|c| (c.clone(), json!(row.get(c).copied().unwrap_or(0.0) as u64)))
                    .collect();
                (k.clone(), Value::Object(counts))
            })
            .collect();

        Ok(CapabilityOutput::new(format!(
            "Prueba chi-cuadrado entre '{}' y '{}': la asociación es {} (χ² = {:.2}, p = {:.4}).",
            row_name,
            col_name,
            verdict(p_value),
            chi_square,
            p_value
        ))
        .with_result("group_column", row_name)
        .with_result("target_column", col_name)
        .with_result("contingency_table", Value::Object(contingency))
        .with_result("significant", p_value < ALPHA)
        .with_metric("chi_square", chi_square)
        .with_metric("p_value", p_value)
        .with_metric("dof", dof)
        .with_metric("cramers_v", cramers_v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_analysis_core::Column;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    fn treatment_dataset(shift: f64) -> TabularDataset {
        let mut groups = Vec::new();
        let mut values = Vec::new();
        for (g, offset) in [("control", 0.0), ("dosis_a", shift), ("dosis_b", 2.0 * shift)] {
            for i in 0..12 {
                groups.push(Some(g.to_string()));
                values.push(Some(50.0 + offset + ((i * 7) % 5) as f64));
            }
        }
        TabularDataset::new(vec![
            Column::text("tratamiento", groups),
            Column::numeric("presion", values),
        ])
        .unwrap()
    }

    #[test]
    fn test_anova_detects_group_difference() {
        let output = Anova
            .analyze(
                &treatment_dataset(5.0),
                "salud",
                &params(json!({"value_column": "presion", "group_column": "tratamiento"})),
            )
            .unwrap();
        assert!(output.metric("p_value").unwrap() < 0.001);
        assert!(output.metric("eta_squared").unwrap() > 0.5);
        assert_eq!(output.result["significant"], json!(true));
    }

    #[test]
    fn test_anova_identical_groups_not_significant() {
        let output = Anova
            .analyze(
                &treatment_dataset(0.0),
                "salud",
                &params(json!({"value_column": "presion", "group_column": "tratamiento"})),
            )
            .unwrap();
        assert!(output.metric("p_value").unwrap() > 0.9);
        assert!(output.summary().unwrap().contains("no significativas"));
    }

    #[test]
    fn test_anova_requires_group_column() {
        let result = Anova.analyze(
            &treatment_dataset(1.0),
            "salud",
            &params(json!({"value_column": "presion"})),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_t_test_compares_first_two_groups() {
        let output = TTest
            .analyze(
                &treatment_dataset(5.0),
                "salud",
                &params(json!({"value_column": "presion", "group_column": "tratamiento"})),
            )
            .unwrap();
        assert_eq!(output.result["groups"], json!(["control", "dosis_a"]));
        assert!(output.metric("t_statistic").unwrap() < 0.0);
        assert!(output.metric("p_value").unwrap() < 0.01);
        assert_eq!(output.result["ignored_groups"], json!(1));
    }

    #[test]
    fn test_chi_square_independent_columns() {
        let a: Vec<Option<String>> = (0..40).map(|i| Some(format!("a{}", i % 2))).collect();
        let b: Vec<Option<String>> = (0..40).map(|i| Some(format!("b{}", (i / 2) % 2))).collect();
        let ds = TabularDataset::new(vec![Column::text("canal", a), Column::text("compra", b)])
            .unwrap();
        let output = ChiSquare
            .analyze(
                &ds,
                "retail",
                &params(json!({"group_column": "canal", "target_column": "compra"})),
            )
            .unwrap();
        assert!(output.metric("chi_square").unwrap().abs() < 1e-9);
        assert!(output.metric("p_value").unwrap() > 0.99);
    }

    #[test]
    fn test_chi_square_dependent_columns() {
        let a: Vec<Option<String>> = (0..40).map(|i| Some(format!("a{}", i % 2))).collect();
        let ds = TabularDataset::new(vec![
            Column::text("canal", a.clone()),
            Column::text("compra", a),
        ])
        .unwrap();
        let output = ChiSquare
            .analyze(
                &ds,
                "retail",
                &params(json!({"group_column": "canal", "target_column": "compra"})),
            )
            .unwrap();
        assert!(output.metric("p_value").unwrap() < 0.001);
        assert!((output.metric("cramers_v").unwrap() - 1.0).abs() < 1e-9);
    }
}
