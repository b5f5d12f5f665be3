//! Classification Capabilities
//!
//! - `RandomForest` - bagged CART trees (gini impurity, random feature subsets)
//! - `LogisticRegression` - multinomial softmax regression by gradient descent
//! - `NaiveBayes` - Gaussian naive Bayes
//!
//! The class label comes from `target_column` (any column type); features are
//! the remaining numeric columns. Models are fitted on a seeded split and
//! evaluated on the held-out rows.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::debug;

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to, Standardizer};
use crate::support;

/// Labelled feature rows
struct LabeledData {
    target: String,
    features: Vec<String>,
    rows: Vec<Vec<f64>>,
    labels: Vec<usize>,
    classes: Vec<String>,
}

impl LabeledData {
    fn prepare(dataset: &TabularDataset, parameters: &Parameters) -> CoreResult<Self> {
        let target = match parameters.get_str("target_column") {
            Some(name) => name.to_string(),
            None => dataset
                .columns()
                .last()
                .map(|c| c.name.clone())
                .ok_or_else(|| CoreError::invalid_data("dataset has no columns"))?,
        };
        let label_column = dataset.require_column(&target)?;
        let features = support::feature_columns(dataset, &[target.as_str()]);
        let (matrix, kept) = support::feature_matrix(dataset, &features, 4)?;

        let mut rows = Vec::with_capacity(matrix.len());
        let mut raw_labels = Vec::with_capacity(matrix.len());
        for (row, index) in matrix.into_iter().zip(kept) {
            if let Some(label) = label_column.key_at(index) {
                rows.push(row);
                raw_labels.push(label);
            }
        }

        let mut classes: Vec<String> = raw_labels.clone();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            return Err(CoreError::invalid_data(format!(
                "column '{}' needs at least two classes",
                target
            )));
        }
        if classes.len() > rows.len() / 2 {
            return Err(CoreError::invalid_data(format!(
                "column '{}' has {} distinct values and does not look like a class label",
                target,
                classes.len()
            )));
        }
        let labels = raw_labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or(0))
            .collect();

        Ok(Self {
            target,
            features,
            rows,
            labels,
            classes,
        })
    }

    fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            indices.iter().map(|&i| self.rows[i].clone()).collect(),
            indices.iter().map(|&i| self.labels[i]).collect(),
        )
    }

    /// Share of the rarest class over all labelled rows
    fn min_class_share(&self) -> f64 {
        let mut counts = vec![0usize; self.classes.len()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        let min = counts.iter().copied().min().unwrap_or(0);
        min as f64 / self.labels.len().max(1) as f64
    }
}

/// Macro-averaged evaluation of predicted class indices
struct Evaluation {
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    confusion: Vec<Vec<usize>>,
}

fn evaluate(actual: &[usize], predicted: &[usize], class_count: usize) -> Evaluation {
    let mut confusion = vec![vec![0usize; class_count]; class_count];
    for (&a, &p) in actual.iter().zip(predicted) {
        confusion[a][p] += 1;
    }
    let total = actual.len().max(1) as f64;
    let correct: usize = (0..class_count).map(|c| confusion[c][c]).sum();

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for c in 0..class_count {
        let tp = confusion[c][c] as f64;
        let predicted_c: usize = (0..class_count).map(|r| confusion[r][c]).sum();
        let actual_c: usize = confusion[c].iter().sum();
        let p = if predicted_c > 0 { tp / predicted_c as f64 } else { 0.0 };
        let r = if actual_c > 0 { tp / actual_c as f64 } else { 0.0 };
        precision += p;
        recall += r;
        f1 += if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
    }
    let k = class_count.max(1) as f64;
    Evaluation {
        accuracy: correct as f64 / total,
        precision: precision / k,
        recall: recall / k,
        f1: f1 / k,
        confusion,
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Fit on the training split, predict the test split and assemble the output
fn run_classifier<F>(
    data: &LabeledData,
    parameters: &Parameters,
    summary: impl FnOnce(&Evaluation) -> String,
    fit_predict: F,
) -> CoreResult<(CapabilityOutput, Value)>
where
    F: FnOnce(&[Vec<f64>], &[usize], &[Vec<f64>], u64) -> CoreResult<(Vec<usize>, Value)>,
{
    let seed = parameters.usize_or("random_state", 42) as u64;
    let test_size = parameters.f64_or("test_size", 0.2);
    let (train, test) = math::train_test_split(data.rows.len(), test_size, seed);
    let (train_x, train_y) = data.subset(&train);
    let (test_x, test_y) = data.subset(&test);
    debug!(
        "Training on {} rows, evaluating on {} rows ({} classes)",
        train_x.len(),
        test_x.len(),
        data.classes.len()
    );

    let (predicted, model_detail) = fit_predict(&train_x, &train_y, &test_x, seed)?;
    let evaluation = evaluate(&test_y, &predicted, data.classes.len());

    let output = CapabilityOutput::new(summary(&evaluation))
        .with_result("target_column", data.target.clone())
        .with_result("features", json!(data.features))
        .with_result("classes", json!(data.classes))
        .with_result("confusion_matrix", json!(evaluation.confusion))
        .with_metric("accuracy", evaluation.accuracy)
        .with_metric("precision", evaluation.precision)
        .with_metric("recall", evaluation.recall)
        .with_metric("f1_score", evaluation.f1)
        .with_metric("min_class_share", data.min_class_share());
    Ok((output, model_detail))
}

// ============================================================================
// Random forest
// ============================================================================

#[derive(Debug)]
enum Node {
    Leaf(usize),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> usize {
        match self {
            Node::Leaf(class) => *class,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [usize],
    class_count: usize,
    max_depth: usize,
    features_per_split: usize,
    importance: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn majority(&self, indices: &[usize]) -> usize {
        let mut counts = vec![0usize; self.class_count];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        argmax(&counts.iter().map(|&c| c as f64).collect::<Vec<_>>())
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let first = self.labels[indices[0]];
        if depth >= self.max_depth
            || indices.len() < 4
            || indices.iter().all(|&i| self.labels[i] == first)
        {
            return Node::Leaf(self.majority(&indices));
        }

        let mut counts = vec![0usize; self.class_count];
        for &i in &indices {
            counts[self.labels[i]] += 1;
        }
        let parent = gini(&counts, indices.len());

        let feature_count = self.rows[0].len();
        let mut candidates: Vec<usize> = (0..feature_count).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.features_per_split);

        let mut best: Option<(usize, f64, f64)> = None;
        for &feature in &candidates {
            let mut sorted = indices.clone();
            sorted.sort_by(|&a, &b| {
                self.rows[a][feature]
                    .partial_cmp(&self.rows[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let mut left = vec![0usize; self.class_count];
            let mut right = counts.clone();
            for split in 1..sorted.len() {
                let moved = sorted[split - 1];
                left[self.labels[moved]] += 1;
                right[self.labels[moved]] -= 1;
                let lo = self.rows[moved][feature];
                let hi = self.rows[sorted[split]][feature];
                if hi <= lo {
                    continue;
                }
                let n = sorted.len() as f64;
                let weighted = split as f64 / n * gini(&left, split)
                    + (sorted.len() - split) as f64 / n * gini(&right, sorted.len() - split);
                let gain = parent - weighted;
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (lo + hi) / 2.0, gain));
                }
            }
        }

        match best {
            Some((feature, threshold, gain)) if gain > 1e-12 => {
                self.importance[feature] += gain * indices.len() as f64;
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| self.rows[i][feature] <= threshold);
                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(left, depth + 1, rng)),
                    right: Box::new(self.build(right, depth + 1, rng)),
                }
            }
            _ => Node::Leaf(self.majority(&indices)),
        }
    }
}

pub struct RandomForest;

impl Capability for RandomForest {
    fn id(&self) -> &str {
        "random_forest"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let data = LabeledData::prepare(dataset, parameters)?;
        let n_estimators = parameters.usize_or("n_estimators", 50).clamp(1, 500);
        let max_depth = parameters.usize_or("max_depth", 8).max(1);
        let class_count = data.classes.len();
        let feature_names = data.features.clone();

        let (output, importance) = run_classifier(
            &data,
            parameters,
            |e| {
                format!(
                    "Random Forest con {} árboles alcanza una precisión del {:.1}% sobre los datos \
                     de validación.",
                    n_estimators,
                    e.accuracy * 100.0
                )
            },
            |train_x, train_y, test_x, seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let feature_count = train_x[0].len();
                let features_per_split = ((feature_count as f64).sqrt().ceil() as usize).max(1);
                let mut builder = TreeBuilder {
                    rows: train_x,
                    labels: train_y,
                    class_count,
                    max_depth,
                    features_per_split,
                    importance: vec![0.0; feature_count],
                };
                let trees: Vec<Node> = (0..n_estimators)
                    .map(|_| {
                        let sample: Vec<usize> = (0..train_x.len())
                            .map(|_| rng.gen_range(0..train_x.len()))
                            .collect();
                        builder.build(sample, 0, &mut rng)
                    })
                    .collect();

                let predicted = test_x
                    .iter()
                    .map(|row| {
                        let mut votes = vec![0.0; class_count];
                        for tree in &trees {
                            votes[tree.predict(row)] += 1.0;
                        }
                        argmax(&votes)
                    })
                    .collect();

                let total: f64 = builder.importance.iter().sum();
                let mut importance = Map::new();
                for (name, value) in feature_names.iter().zip(&builder.importance) {
                    let share = if total > 0.0 { value / total } else { 0.0 };
                    importance.insert(name.clone(), json!(round_to(share, 4)));
                }
                Ok((predicted, Value::Object(importance)))
            },
        )?;
        Ok(output
            .with_result("feature_importance", importance)
            .with_result("n_estimators", n_estimators))
    }
}

// ============================================================================
// Logistic regression
// ============================================================================

fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

pub struct LogisticRegression;

impl Capability for LogisticRegression {
    fn id(&self) -> &str {
        "logistic_regression"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let data = LabeledData::prepare(dataset, parameters)?;
        let iterations = parameters.usize_or("max_iter", 300).max(1);
        let learning_rate = parameters.f64_or("learning_rate", 0.1);
        let class_count = data.classes.len();
        let feature_names = data.features.clone();
        let class_names = data.classes.clone();

        let (output, coefficients) = run_classifier(
            &data,
            parameters,
            |e| {
                format!(
                    "La regresión logística clasifica correctamente el {:.1}% de los casos de \
                     validación.",
                    e.accuracy * 100.0
                )
            },
            |train_x, train_y, test_x, _seed| {
                let scaler = Standardizer::fit(train_x);
                let x = scaler.transform(train_x);
                let dims = x[0].len() + 1;
                let mut weights = vec![vec![0.0; dims]; class_count];
                let n = x.len() as f64;

                for _ in 0..iterations {
                    let mut gradient = vec![vec![0.0; dims]; class_count];
                    for (row, &label) in x.iter().zip(train_y) {
                        let mut scores: Vec<f64> = weights
                            .iter()
                            .map(|w| w[0] + w[1..].iter().zip(row).map(|(a, b)| a * b).sum::<f64>())
                            .collect();
                        softmax(&mut scores);
                        for c in 0..class_count {
                            let err = scores[c] - if c == label { 1.0 } else { 0.0 };
                            gradient[c][0] += err;
                            for j in 0..row.len() {
                                gradient[c][j + 1] += err * row[j];
                            }
                        }
                    }
                    for c in 0..class_count {
                        for j in 0..dims {
                            let penalty = if j == 0 { 0.0 } else { 1e-3 * weights[c][j] };
                            weights[c][j] -= learning_rate * (gradient[c][j] / n + penalty);
                        }
                    }
                }

                let predicted = scaler
                    .transform(test_x)
                    .iter()
                    .map(|row| {
                        let scores: Vec<f64> = weights
                            .iter()
                            .map(|w| w[0] + w[1..].iter().zip(row).map(|(a, b)| a * b).sum::<f64>())
                            .collect();
                        argmax(&scores)
                    })
                    .collect();

                let mut coefficients = Map::new();
                for (class, w) in class_names.iter().zip(&weights) {
                    let mut per_feature = Map::new();
                    per_feature.insert("intercept".to_string(), json!(round_to(w[0], 4)));
                    for (name, value) in feature_names.iter().zip(&w[1..]) {
                        per_feature.insert(name.clone(), json!(round_to(*value, 4)));
                    }
                    coefficients.insert(class.clone(), Value::Object(per_feature));
                }
                Ok((predicted, Value::Object(coefficients)))
            },
        )?;
        Ok(output.with_result("coefficients", coefficients))
    }
}

// ============================================================================
// Naive Bayes
// ============================================================================

pub struct NaiveBayes;

impl Capability for NaiveBayes {
    fn id(&self) -> &str {
        "naive_bayes"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let data = LabeledData::prepare(dataset, parameters)?;
        let class_count = data.classes.len();
        let class_names = data.classes.clone();

        let (output, priors) = run_classifier(
            &data,
            parameters,
            |e| {
                format!(
                    "Naive Bayes gaussiano obtiene una precisión del {:.1}% y un F1 de {:.2}.",
                    e.accuracy * 100.0,
                    e.f1
                )
            },
            |train_x, train_y, test_x, _seed| {
                let dims = train_x[0].len();
                let mut grouped: BTreeMap<usize, Vec<&Vec<f64>>> = BTreeMap::new();
                for (row, &label) in train_x.iter().zip(train_y) {
                    grouped.entry(label).or_default().push(row);
                }
                // Variance floor keeps constant features from dominating
                let floor = 1e-9
                    * (0..dims)
                        .map(|j| math::variance(&train_x.iter().map(|r| r[j]).collect::<Vec<_>>()))
                        .fold(0.0, f64::max)
                    + 1e-12;

                let mut stats: Vec<Option<(f64, Vec<f64>, Vec<f64>)>> = vec![None; class_count];
                for (label, rows) in &grouped {
                    let prior = rows.len() as f64 / train_x.len() as f64;
                    let mut means = Vec::with_capacity(dims);
                    let mut vars = Vec::with_capacity(dims);
                    for j in 0..dims {
                        let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
                        means.push(math::mean(&column));
                        vars.push(math::variance(&column) + floor);
                    }
                    stats[*label] = Some((prior, means, vars));
                }

                let predicted = test_x
                    .iter()
                    .map(|row| {
                        let scores: Vec<f64> = stats
                            .iter()
                            .map(|s| match s {
                                Some((prior, means, vars)) => {
                                    prior.ln()
                                        + row
                                            .iter()
                                            .zip(means.iter().zip(vars))
                                            .map(|(x, (m, v))| {
                                                -0.5 * (2.0 * std::f64::consts::PI * v).ln()
                                                    - (x - m).powi(2) / (2.0 * v)
                                            })
                                            .sum::<f64>()
                                }
                                None => f64::NEG_INFINITY,
                            })
                            .collect();
                        argmax(&scores)
                    })
                    .collect();

                let mut priors = Map::new();
                for (label, s) in stats.iter().enumerate() {
                    let prior = s.as_ref().map(|(p, _, _)| *p).unwrap_or(0.0);
                    priors.insert(class_names[label].clone(), json!(round_to(prior, 4)));
                }
                Ok((predicted, Value::Object(priors)))
            },
        )?;
        Ok(output.with_result("class_priors", priors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_analysis_core::Column;

    /// Two well-separated classes in two features plus a text label
    fn separable(n: usize) -> TabularDataset {
        let mut x1 = Vec::new();
        let mut x2 = Vec::new();
        let mut label = Vec::new();
        for i in 0..n {
            let class_a = i % 2 == 0;
            let jitter = (i % 7) as f64 * 0.1;
            x1.push(Some(if class_a { 1.0 } else { 8.0 } + jitter));
            x2.push(Some(if class_a { 2.0 } else { 9.0 } - jitter));
            label.push(Some(if class_a { "bajo" } else { "alto" }.to_string()));
        }
        TabularDataset::new(vec![
            Column::numeric("x1", x1),
            Column::numeric("x2", x2),
            Column::text("segmento", label),
        ])
        .unwrap()
    }

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_evaluate_macro_scores() {
        let e = evaluate(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        assert_eq!(e.accuracy, 0.75);
        assert_eq!(e.confusion, vec![vec![1, 1], vec![0, 2]]);
        assert!(e.f1 > 0.7 && e.f1 < 0.8);
    }

    #[test]
    fn test_random_forest_separable() {
        let output = RandomForest
            .analyze(
                &separable(60),
                "retail",
                &params(json!({
                    "target_column": "segmento",
                    "n_estimators": 10,
                    "random_state": 7
                })),
            )
            .unwrap();
        assert!(output.metric("accuracy").unwrap() > 0.9);
        assert_eq!(output.metric("min_class_share"), Some(0.5));
        assert!(output.result["feature_importance"].get("x1").is_some());
    }

    #[test]
    fn test_random_forest_is_deterministic() {
        let p = params(json!({"target_column": "segmento", "n_estimators": 5}));
        let a = RandomForest.analyze(&separable(40), "retail", &p).unwrap();
        let b = RandomForest.analyze(&separable(40), "retail", &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_logistic_regression_separable() {
        let output = LogisticRegression
            .analyze(&separable(50), "finanzas", &params(json!({"target_column": "segmento"})))
            .unwrap();
        assert!(output.metric("accuracy").unwrap() > 0.9);
        assert!(output.result["coefficients"].get("alto").is_some());
    }

    #[test]
    fn test_naive_bayes_separable() {
        let output = NaiveBayes
            .analyze(&separable(50), "salud", &params(json!({"target_column": "segmento"})))
            .unwrap();
        assert!(output.metric("f1_score").unwrap() > 0.9);
        assert_eq!(output.result["classes"], json!(["alto", "bajo"]));
    }

    #[test]
    fn test_single_class_is_rejected() {
        let ds = TabularDataset::new(vec![
            Column::numeric("x", (0..20).map(|i| Some(i as f64)).collect()),
            Column::text("y", (0..20).map(|_| Some("a".to_string())).collect()),
        ])
        .unwrap();
        let result = NaiveBayes.analyze(&ds, "retail", &params(json!({"target_column": "y"})));
        assert!(matches!(result, Err(CoreError::InvalidData(_))));
    }
}
