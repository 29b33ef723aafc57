//! K-Means clustering: k-means++ seeding, Lloyd iterations and quality metrics

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Non-fatal report that a fit stopped at the iteration cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceWarning {
    /// Cluster count of the run
    pub k: usize,
    /// Iteration cap that was reached
    pub max_iter: usize,
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "k-means with k={} stopped after {} iterations without stable assignments",
            self.k, self.max_iter
        )
    }
}

/// Per-record cluster ids produced by a fit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    labels: Vec<usize>,
    n_clusters: usize,
}

impl ClusterAssignment {
    /// Build an assignment; every label must be below `n_clusters`
    pub fn new(labels: Vec<usize>, n_clusters: usize) -> Result<Self> {
        if let Some(&bad) = labels.iter().find(|&&label| label >= n_clusters) {
            return Err(Error::invalid_parameter(format!(
                "cluster id {bad} out of range for {n_clusters} clusters"
            )));
        }
        Ok(Self { labels, n_clusters })
    }

    /// Cluster id of every record, in record order
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of clusters, empty ones included
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Number of assigned records
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no record is assigned
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Record indices belonging to `cluster`, in record order
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Fitted K-Means model
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster assignments for training data
    pub labels: Array1<usize>,
    /// Cluster centroids in standardized space (n_clusters, n_features)
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
    /// Lloyd iterations of the kept run
    pub n_iter: usize,
    /// Whether assignments stabilized before the iteration cap
    pub converged: bool,
    max_iter: usize,
}

impl KMeansModel {
    /// Predict cluster for a standardized feature vector
    pub fn predict(&self, features: ArrayView1<f64>) -> Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(Error::invalid_parameter(format!(
                "feature vector has {} dimensions, model expects {}",
                features.len(),
                self.centroids.ncols()
            )));
        }
        Ok(nearest_centroid(features, self.centroids.view()).0)
    }

    /// Predict clusters for every row of a standardized matrix
    pub fn predict_batch(&self, data: ArrayView2<f64>) -> Result<Vec<usize>> {
        data.rows().into_iter().map(|row| self.predict(row)).collect()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    /// Training labels as a [`ClusterAssignment`]
    pub fn assignment(&self) -> ClusterAssignment {
        ClusterAssignment {
            labels: self.labels.to_vec(),
            n_clusters: self.n_clusters,
        }
    }

    /// Present when the kept run hit the iteration cap
    pub fn convergence_warning(&self) -> Option<ConvergenceWarning> {
        (!self.converged).then_some(ConvergenceWarning {
            k: self.n_clusters,
            max_iter: self.max_iter,
        })
    }
}

/// K-Means parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    /// Number of clusters
    pub n_clusters: usize,
    /// Maximum Lloyd iterations per run
    pub max_iter: usize,
    /// Number of seeded restarts; the lowest-inertia run is kept
    pub n_init: usize,
    /// Seed of the first restart, later restarts use `seed + i`
    pub seed: u64,
}

impl KMeans {
    /// Parameters for `n_clusters` with 300 iterations, 10 restarts and seed 42
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            n_init: 10,
            seed: 42,
        }
    }

    /// Set the Lloyd iteration cap
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of seeded restarts
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the seed of the first restart
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on a standardized matrix (n_samples, n_features)
    pub fn fit(&self, data: ArrayView2<f64>) -> Result<KMeansModel> {
        if self.n_clusters == 0 {
            return Err(Error::invalid_parameter("n_clusters must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter must be > 0"));
        }
        if self.n_init == 0 {
            return Err(Error::invalid_parameter("n_init must be > 0"));
        }
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::EmptyData);
        }

        let distinct = count_distinct_rows(data);
        if distinct < self.n_clusters {
            return Err(Error::InsufficientData {
                k: self.n_clusters,
                distinct,
            });
        }

        let mut best: Option<KMeansModel> = None;
        for i in 0..self.n_init {
            let run = self.fit_single(data, self.seed.wrapping_add(i as u64));
            debug!(k = self.n_clusters, init = i, inertia = run.inertia, n_iter = run.n_iter, "k-means run");
            match &best {
                Some(current) if run.inertia >= current.inertia => {}
                _ => best = Some(run),
            }
        }

        let model = best.ok_or_else(|| Error::invalid_parameter("n_init must be > 0"))?;
        if let Some(warning) = model.convergence_warning() {
            warn!(k = warning.k, max_iter = warning.max_iter, "{}", warning);
        }
        Ok(model)
    }

    fn fit_single(&self, data: ArrayView2<f64>, seed: u64) -> KMeansModel {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = kmeans_plus_plus(data, self.n_clusters, &mut rng);

        let mut labels = assign_points(data, centroids.view());
        let mut n_iter = 0;
        let mut converged = false;

        while n_iter < self.max_iter {
            n_iter += 1;
            update_centroids(data, &labels, &mut centroids);
            let new_labels = assign_points(data, centroids.view());
            if new_labels == labels {
                converged = true;
                break;
            }
            labels = new_labels;
        }

        let inertia = compute_inertia(data, &labels, centroids.view());
        KMeansModel {
            n_clusters: self.n_clusters,
            labels,
            centroids,
            inertia,
            n_iter,
            converged,
            max_iter: self.max_iter,
        }
    }
}

/// Fit with the given parameters; shorthand for [`KMeans::fit`]
pub fn fit_kmeans(
    data: ArrayView2<f64>,
    n_clusters: usize,
    max_iter: usize,
    n_init: usize,
    seed: u64,
) -> Result<KMeansModel> {
    KMeans::new(n_clusters)
        .max_iter(max_iter)
        .n_init(n_init)
        .seed(seed)
        .fit(data)
}

/// k-means++ seeding: first centroid uniform, the rest weighted by squared distance
fn kmeans_plus_plus<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut min_sq: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, data.row(first)))
        .collect();

    for c in 1..k {
        let total: f64 = min_sq.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &w) in min_sq.iter().enumerate() {
                cumulative += w;
                if w > 0.0 && cumulative > target {
                    pick = Some(i);
                    break;
                }
            }
            // rounding can leave the target just past the final sum
            pick.unwrap_or_else(|| min_sq.iter().rposition(|&w| w > 0.0).unwrap_or(0))
        } else {
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&data.row(chosen));
        for (i, row) in data.rows().into_iter().enumerate() {
            let d = squared_distance(row, data.row(chosen));
            if d < min_sq[i] {
                min_sq[i] = d;
            }
        }
    }

    centroids
}

/// Nearest centroid and its squared distance; ties go to the lowest id
fn nearest_centroid(point: ArrayView1<f64>, centroids: ArrayView2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn assign_points(data: ArrayView2<f64>, centroids: ArrayView2<f64>) -> Array1<usize> {
    data.rows()
        .into_iter()
        .map(|row| nearest_centroid(row, centroids).0)
        .collect()
}

/// Move each centroid to the mean of its members; an emptied cluster keeps its centroid
fn update_centroids(data: ArrayView2<f64>, labels: &Array1<usize>, centroids: &mut Array2<f64>) {
    let k = centroids.nrows();
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; k];

    for (row, &label) in data.rows().into_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(c) / count as f64;
            centroids.row_mut(c).assign(&mean);
        }
    }
}

/// Compute within-cluster sum of squares (inertia)
pub fn compute_inertia(data: ArrayView2<f64>, labels: &Array1<usize>, centroids: ArrayView2<f64>) -> f64 {
    data.rows()
        .into_iter()
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .sum()
}

/// Mean silhouette coefficient over all points
///
/// For point i, `a` is the mean distance to the other members of its cluster and
/// `b` the smallest mean distance to the members of another cluster; the point
/// scores `(b - a) / max(a, b)`. Points alone in their cluster score 0, as do all
/// points when fewer than two clusters are populated.
pub fn silhouette_score(data: ArrayView2<f64>, labels: &[usize]) -> f64 {
    let n = data.nrows().min(labels.len());
    if n < 2 {
        return 0.0;
    }

    let n_clusters = labels[..n].iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0usize; n_clusters];
    for &label in &labels[..n] {
        sizes[label] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; n_clusters];
    for i in 0..n {
        let own = labels[i];
        if sizes[own] < 2 {
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        let point = data.row(i);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += euclidean_distance(point, data.row(j));
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_clusters)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

/// Silhouette on a seeded random subset of `sample_size` points
///
/// Falls back to the full score when the sample would cover every point.
pub fn silhouette_score_sampled(data: ArrayView2<f64>, labels: &[usize], sample_size: usize, seed: u64) -> f64 {
    let n = data.nrows().min(labels.len());
    if sample_size >= n {
        return silhouette_score(data, labels);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
    indices.sort_unstable();

    let subset = data.select(Axis(0), &indices);
    let sub_labels: Vec<usize> = indices.iter().map(|&i| labels[i]).collect();
    silhouette_score(subset.view(), &sub_labels)
}

/// Number of pairwise distinct rows, compared bit for bit
pub fn count_distinct_rows(data: ArrayView2<f64>) -> usize {
    data.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| (v + 0.0).to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}
