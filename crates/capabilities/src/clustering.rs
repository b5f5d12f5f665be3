//! Clustering Capabilities
//!
//! - `KMeans` - Lloyd iterations from a k-means++ seeding
//! - `Hierarchical` - agglomerative clustering (average, single or complete linkage)
//! - `Dbscan` - density-based clustering with noise detection
//!
//! All three work on the z-scored numeric columns; cluster centers are
//! reported back in the original units.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::debug;

use ml_analysis_core::{
    Capability, CapabilityOutput, CoreError, CoreResult, Parameters, ParamsExt, TabularDataset,
};

use crate::math::{self, round_to, Standardizer};
use crate::support;

/// Row cap for the quadratic-memory agglomerative algorithm
const HIERARCHICAL_MAX_ROWS: usize = 500;

struct Prepared {
    features: Vec<String>,
    scaler: Standardizer,
    points: Vec<Vec<f64>>,
}

fn prepare(dataset: &TabularDataset, min_rows: usize) -> CoreResult<Prepared> {
    let features = support::feature_columns(dataset, &[]);
    let (rows, _) = support::feature_matrix(dataset, &features, min_rows)?;
    let scaler = Standardizer::fit(&rows);
    let points = scaler.transform(&rows);
    Ok(Prepared {
        features,
        scaler,
        points,
    })
}

/// Per-cluster summaries `{id, size, center}` for labels `0..k`
fn describe_clusters(prepared: &Prepared, labels: &[Option<usize>], k: usize) -> Vec<Value> {
    let dims = prepared.features.len();
    (0..k)
        .map(|cluster| {
            let members: Vec<&Vec<f64>> = prepared
                .points
                .iter()
                .zip(labels)
                .filter(|(_, l)| **l == Some(cluster))
                .map(|(p, _)| p)
                .collect();
            let mut centroid = vec![0.0; dims];
            for p in &members {
                for j in 0..dims {
                    centroid[j] += p[j];
                }
            }
            if !members.is_empty() {
                for v in centroid.iter_mut() {
                    *v /= members.len() as f64;
                }
            }
            let original = prepared.scaler.inverse_row(&centroid);
            let mut center = Map::new();
            for (name, value) in prepared.features.iter().zip(original) {
                center.insert(name.clone(), json!(round_to(value, 4)));
            }
            json!({
                "id": cluster,
                "size": members.len(),
                "center": center,
            })
        })
        .collect()
}

fn with_silhouette(
    output: CapabilityOutput,
    points: &[Vec<f64>],
    labels: &[Option<usize>],
) -> CapabilityOutput {
    match math::silhouette(points, labels) {
        Some(score) => output.with_metric("silhouette", score),
        None => output,
    }
}

// ============================================================================
// K-means
// ============================================================================

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, math::euclidean(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centers = vec![points[rng.gen_range(0..points.len())].clone()];
    while centers.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| nearest(p, &centers).1.powi(2))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centers.push(points[chosen].clone());
    }
    centers
}

fn lloyd(
    points: &[Vec<f64>],
    mut centers: Vec<Vec<f64>>,
    max_iter: usize,
) -> (Vec<usize>, Vec<Vec<f64>>, f64) {
    let k = centers.len();
    let dims = points[0].len();
    let mut labels = vec![0usize; points.len()];

    for iteration in 0..max_iter {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let (label, _) = nearest(p, &centers);
            changed |= labels[i] != label;
            labels[i] = label;
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for j in 0..dims {
                sums[label][j] += p[j];
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // Re-seed an empty cluster with the point farthest from its center
                let (far, _) = points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (i, math::euclidean(p, &centers[labels[i]])))
                    .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
                centers[c] = points[far].clone();
                labels[far] = c;
                changed = true;
            } else {
                centers[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            }
        }
        if !changed && iteration > 0 {
            debug!("K-means converged after {} iterations", iteration + 1);
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| math::euclidean(p, &centers[l]).powi(2))
        .sum();
    (labels, centers, inertia)
}

pub struct KMeans;

impl Capability for KMeans {
    fn id(&self) -> &str {
        "kmeans"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let k = parameters.usize_or("n_clusters", 3);
        if k < 2 {
            return Err(CoreError::validation("n_clusters must be at least 2"));
        }
        let seed = parameters.usize_or("random_state", 42) as u64;
        let max_iter = parameters.usize_or("max_iter", 100).max(1);
        let prepared = prepare(dataset, k)?;

        let mut distinct = prepared.points.clone();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        distinct.dedup();
        if distinct.len() < k {
            return Err(CoreError::invalid_data(format!(
                "{} distinct rows cannot form {} clusters",
                distinct.len(),
                k
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let initial = kmeans_plus_plus(&prepared.points, k, &mut rng);
        let (labels, _, inertia) = lloyd(&prepared.points, initial, max_iter);
        let labels: Vec<Option<usize>> = labels.into_iter().map(Some).collect();
        let clusters = describe_clusters(&prepared, &labels, k);

        let summary = if industry == "retail" {
            format!(
                "Se identificaron {} segmentos de clientes a partir de {} variables.",
                k,
                prepared.features.len()
            )
        } else {
            format!(
                "Se identificaron {} grupos con características similares a partir de {} \
                 variables.",
                k,
                prepared.features.len()
            )
        };
        let output = CapabilityOutput::new(summary)
            .with_result("features", json!(prepared.features))
            .with_result("clusters", Value::Array(clusters))
            .with_metric("inertia", inertia)
            .with_metric("n_clusters", k as f64);
        Ok(with_silhouette(output, &prepared.points, &labels))
    }
}

// ============================================================================
// Hierarchical
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Linkage {
    Average,
    Single,
    Complete,
}

impl Linkage {
    fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "average" => Ok(Linkage::Average),
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            other => Err(CoreError::validation(format!("unknown linkage '{}'", other))),
        }
    }

    /// Lance-Williams update of the distance from `k` to the merge of `i` and `j`
    fn merge(self, d_ik: f64, d_jk: f64, size_i: usize, size_j: usize) -> f64 {
        match self {
            Linkage::Single => d_ik.min(d_jk),
            Linkage::Complete => d_ik.max(d_jk),
            Linkage::Average => {
                (size_i as f64 * d_ik + size_j as f64 * d_jk) / (size_i + size_j) as f64
            }
        }
    }
}

pub struct Hierarchical;

impl Capability for Hierarchical {
    fn id(&self) -> &str {
        "hierarchical"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let k = parameters.usize_or("n_clusters", 3);
        if k < 2 {
            return Err(CoreError::validation("n_clusters must be at least 2"));
        }
        let linkage = Linkage::parse(parameters.get_str("linkage").unwrap_or("average"))?;
        let mut prepared = prepare(dataset, k)?;
        let truncated = prepared.points.len() > HIERARCHICAL_MAX_ROWS;
        prepared.points.truncate(HIERARCHICAL_MAX_ROWS);
        let n = prepared.points.len();

        let mut distance = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = math::euclidean(&prepared.points[i], &prepared.points[j]);
                distance[i][j] = d;
                distance[j][i] = d;
            }
        }
        let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
        let mut merge_heights = Vec::new();
        let mut active = n;

        while active > k {
            let mut best = (0, 0, f64::INFINITY);
            for i in 0..n {
                if members[i].is_none() {
                    continue;
                }
                for j in (i + 1)..n {
                    if members[j].is_some() && distance[i][j] < best.2 {
                        best = (i, j, distance[i][j]);
                    }
                }
            }
            let (i, j, height) = best;
            let size_i = members[i].as_ref().map_or(0, Vec::len);
            let size_j = members[j].as_ref().map_or(0, Vec::len);
            for other in 0..n {
                if other == i || other == j || members[other].is_none() {
                    continue;
                }
                let d = linkage.merge(distance[i][other], distance[j][other], size_i, size_j);
                distance[i][other] = d;
                distance[other][i] = d;
            }
            let absorbed = members[j].take().unwrap_or_default();
            if let Some(group) = members[i].as_mut() {
                group.extend(absorbed);
            }
            merge_heights.push(height);
            active -= 1;
        }

        let mut labels = vec![None; n];
        for (cluster, group) in members.iter().flatten().enumerate() {
            for &point in group {
                labels[point] = Some(cluster);
            }
        }
        let clusters = describe_clusters(&prepared, &labels, k);
        let last_merge = merge_heights.last().copied().unwrap_or(0.0);

        let output = CapabilityOutput::new(format!(
            "El clustering jerárquico ({:?}) agrupa {} observaciones en {} conglomerados.",
            linkage, n, k
        ))
        .with_result("features", json!(prepared.features))
        .with_result("clusters", Value::Array(clusters))
        .with_result("linkage", format!("{:?}", linkage).to_lowercase())
        .with_result("truncated", truncated)
        .with_metric("n_clusters", k as f64)
        .with_metric("last_merge_distance", last_merge);
        Ok(with_silhouette(output, &prepared.points, &labels))
    }
}

// ============================================================================
// DBSCAN
// ============================================================================

pub struct Dbscan;

impl Capability for Dbscan {
    fn id(&self) -> &str {
        "dbscan"
    }

    fn analyze(
        &self,
        dataset: &TabularDataset,
        _industry: &str,
        parameters: &Parameters,
    ) -> CoreResult<CapabilityOutput> {
        let eps = parameters.f64_or("eps", 0.5);
        let min_samples = parameters.usize_or("min_samples", 5).max(1);
        if eps <= 0.0 {
            return Err(CoreError::validation("eps must be positive"));
        }
        let prepared = prepare(dataset, 2)?;
        let points = &prepared.points;
        let n = points.len();

        let neighbours = |i: usize| -> Vec<usize> {
            (0..n)
                .filter(|&j| math::euclidean(&points[i], &points[j]) <= eps)
                .collect()
        };

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut cluster_count = 0;
        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            let seeds = neighbours(i);
            if seeds.len() < min_samples {
                continue;
            }
            let cluster = cluster_count;
            cluster_count += 1;
            labels[i] = Some(cluster);
            let mut queue = seeds;
            while let Some(j) = queue.pop() {
                if labels[j].is_none() {
                    labels[j] = Some(cluster);
                }
                if visited[j] {
                    continue;
                }
                visited[j] = true;
                let expansion = neighbours(j);
                if expansion.len() >= min_samples {
                    queue.extend(expansion);
                }
            }
        }

        let noise = labels.iter().filter(|l| l.is_none()).count();
        let clusters = describe_clusters(&prepared, &labels, cluster_count);
        let output = CapabilityOutput::new(format!(
            "DBSCAN encontró {} grupos densos y {} observaciones atípicas (ruido).",
            cluster_count, noise
        ))
        .with_result("features", json!(prepared.features))
        .with_result("clusters", Value::Array(clusters))
        .with_metric("n_clusters", cluster_count as f64)
        .with_metric("noise_ratio", noise as f64 / n as f64);
        Ok(with_silhouette(output, points, &labels))
    }
}
