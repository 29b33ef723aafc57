//! Cluster-count selection by elbow and silhouette analysis

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{silhouette_score, silhouette_score_sampled, KMeans};

/// Inclusive range of candidate cluster counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KRange {
    pub min: usize,
    pub max: usize,
}

impl Default for KRange {
    fn default() -> Self {
        Self { min: 2, max: 10 }
    }
}

impl KRange {
    /// Candidates `min..=max`; checked by [`KRange::validate`]
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// A single candidate; selection then fits exactly once
    pub fn fixed(k: usize) -> Self {
        Self { min: k, max: k }
    }

    /// Require `2 <= min <= max`
    pub fn validate(&self) -> Result<()> {
        if self.min < 2 {
            return Err(Error::invalid_parameter(format!(
                "smallest candidate k must be >= 2 for silhouette scoring, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(Error::invalid_parameter(format!(
                "empty k range {}..={}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Candidates in ascending order
    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.min..=self.max
    }

    /// Whether `k` is a candidate
    pub fn contains(&self, k: usize) -> bool {
        self.iter().contains(&k)
    }
}

/// Quality metrics of one candidate k
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub k: usize,
    /// Within-cluster sum of squares
    pub inertia: f64,
    /// Mean silhouette coefficient, in [-1, 1]
    pub silhouette: f64,
    pub converged: bool,
}

/// Outcome of a cluster-count search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSelection {
    pub best_k: usize,
    /// One entry per candidate, ascending k
    pub scores: Vec<CandidateScore>,
}

impl ClusterSelection {
    /// Score of the chosen k
    pub fn best_score(&self) -> Option<&CandidateScore> {
        self.scores.iter().find(|s| s.k == self.best_k)
    }

    /// Inertia per candidate, ascending k
    pub fn inertias(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.inertia).collect()
    }

    /// Silhouette per candidate, ascending k
    pub fn silhouettes(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.silhouette).collect()
    }
}

/// Scores every k in a range and keeps the one with the highest silhouette
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSelector {
    pub range: KRange,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    /// Score on a seeded subset of this many points instead of all of them
    pub silhouette_sample_size: Option<usize>,
}

impl Default for ClusterSelector {
    fn default() -> Self {
        Self {
            range: KRange::default(),
            seed: 42,
            n_init: 10,
            max_iter: 300,
            silhouette_sample_size: None,
        }
    }
}

impl ClusterSelector {
    /// Selector over `range` with seed 42, 10 restarts and 300 iterations
    pub fn new(range: KRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    /// Set the seed for fits and silhouette sampling
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set restarts per candidate
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the Lloyd iteration cap
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Score silhouettes on a sample of this size
    pub fn silhouette_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.silhouette_sample_size = sample_size;
        self
    }

    /// The k-means parameters used for candidate `k`
    pub fn kmeans(&self, k: usize) -> KMeans {
        KMeans::new(k)
            .seed(self.seed)
            .n_init(self.n_init)
            .max_iter(self.max_iter)
    }

    /// Fit each candidate k once; any failing k aborts the whole search
    pub fn select(&self, data: ArrayView2<f64>) -> Result<ClusterSelection> {
        self.range.validate()?;

        let mut scores = Vec::with_capacity(self.range.max - self.range.min + 1);
        for k in self.range.iter() {
            let model = self.kmeans(k).fit(data)?;
            let labels = model.labels.to_vec();
            let silhouette = match self.silhouette_sample_size {
                Some(size) => silhouette_score_sampled(data, &labels, size, self.seed),
                None => silhouette_score(data, &labels),
            };

            debug!(k, inertia = model.inertia, silhouette, converged = model.converged, "scored candidate");
            scores.push(CandidateScore {
                k,
                inertia: model.inertia,
                silhouette,
                converged: model.converged,
            });
        }

        let mut best = &scores[0];
        for candidate in &scores[1..] {
            if candidate.silhouette > best.silhouette {
                best = candidate;
            }
        }
        let best_k = best.k;

        info!(best_k, silhouette = best.silhouette, candidates = scores.len(), "selected cluster count");
        Ok(ClusterSelection { best_k, scores })
    }
}

/// Search `k_range` with default fitting parameters and the given seed
pub fn find_optimal_clusters(data: ArrayView2<f64>, k_range: KRange, seed: u64) -> Result<ClusterSelection> {
    ClusterSelector::new(k_range).seed(seed).select(data)
}
