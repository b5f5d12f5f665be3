//! Column selection shared by the capability implementations

use ml_analysis_core::{CoreError, CoreResult, Parameters, ParamsExt, TabularDataset};

/// Numeric column named by `key`, or the first numeric column when the
/// parameter is absent.
pub fn target_column(
    dataset: &TabularDataset,
    parameters: &Parameters,
    key: &str,
) -> CoreResult<String> {
    match parameters.get_str(key) {
        Some(name) => {
            let column = dataset.require_column(name)?;
            if !column.is_numeric() {
                return Err(CoreError::invalid_data(format!(
                    "column '{}' given as {} is not numeric",
                    name, key
                )));
            }
            Ok(name.to_string())
        }
        None => dataset
            .numeric_columns()
            .first()
            .map(|c| c.name.clone())
            .ok_or_else(|| CoreError::invalid_data("dataset has no numeric columns")),
    }
}

/// Column named by `key` of any type, which must exist
pub fn required_column(
    dataset: &TabularDataset,
    parameters: &Parameters,
    key: &str,
) -> CoreResult<String> {
    let name = parameters
        .get_str(key)
        .ok_or_else(|| CoreError::validation(format!("parameter '{}' is required", key)))?;
    dataset.require_column(name)?;
    Ok(name.to_string())
}

/// Names of all numeric columns except the excluded ones
pub fn feature_columns(dataset: &TabularDataset, exclude: &[&str]) -> Vec<String> {
    dataset
        .numeric_columns()
        .into_iter()
        .filter(|c| !exclude.contains(&c.name.as_str()))
        .map(|c| c.name.clone())
        .collect()
}

/// Feature matrix plus the row indices it was built from. Fails when no
/// feature column remains or every row has a missing cell.
pub fn feature_matrix(
    dataset: &TabularDataset,
    features: &[String],
    min_rows: usize,
) -> CoreResult<(Vec<Vec<f64>>, Vec<usize>)> {
    if features.is_empty() {
        return Err(CoreError::invalid_data("no numeric feature columns available"));
    }
    let names: Vec<&str> = features.iter().map(String::as_str).collect();
    let (rows, kept) = dataset.numeric_matrix(&names)?;
    if rows.len() < min_rows {
        return Err(CoreError::invalid_data(format!(
            "{} complete rows available, at least {} required",
            rows.len(),
            min_rows
        )));
    }
    Ok((rows, kept))
}
