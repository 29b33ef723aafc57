//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::features::ZeroVariancePolicy;
use crate::selection::{ClusterSelector, KRange};

/// How the number of clusters is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterCount {
    /// Search the range and keep the best silhouette
    Auto(KRange),
    /// Use this k; it is still scored, but no search happens
    Fixed(usize),
}

impl Default for ClusterCount {
    fn default() -> Self {
        Self::Auto(KRange::default())
    }
}

impl ClusterCount {
    /// Candidate range; a fixed count is a one-element range
    pub fn range(&self) -> KRange {
        match *self {
            Self::Auto(range) => range,
            Self::Fixed(k) => KRange::fixed(k),
        }
    }
}

/// Settings for one segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    pub cluster_count: ClusterCount,
    /// Seed for k-means++ seeding and silhouette sampling
    pub seed: u64,
    /// Restarts per k; the lowest-inertia run is kept
    pub n_init: usize,
    /// Lloyd iteration cap
    pub max_iter: usize,
    pub silhouette_sample_size: Option<usize>,
    pub zero_variance: ZeroVariancePolicy,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            cluster_count: ClusterCount::default(),
            seed: 42,
            n_init: 10,
            max_iter: 300,
            silhouette_sample_size: None,
            zero_variance: ZeroVariancePolicy::Reject,
        }
    }
}

impl SegmentationConfig {
    /// Load a JSON configuration; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set how k is chosen
    pub fn cluster_count(mut self, cluster_count: ClusterCount) -> Self {
        self.cluster_count = cluster_count;
        self
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set restarts per k
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the Lloyd iteration cap
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Score silhouettes on a sample of this size; `None` scores every record
    pub fn silhouette_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.silhouette_sample_size = sample_size;
        self
    }

    /// Set the handling of constant feature columns
    pub fn zero_variance(mut self, policy: ZeroVariancePolicy) -> Self {
        self.zero_variance = policy;
        self
    }

    /// Reject empty or too-small k ranges and zero restarts, iterations or sample sizes
    pub fn validate(&self) -> Result<()> {
        self.cluster_count.range().validate()?;
        if self.n_init == 0 {
            return Err(Error::invalid_parameter("n_init must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter must be > 0"));
        }
        if self.silhouette_sample_size.is_some_and(|size| size < 2) {
            return Err(Error::invalid_parameter("silhouette sample size must be >= 2"));
        }
        Ok(())
    }

    /// Cluster selector carrying these settings
    pub fn selector(&self) -> ClusterSelector {
        ClusterSelector::new(self.cluster_count.range())
            .seed(self.seed)
            .n_init(self.n_init)
            .max_iter(self.max_iter)
            .silhouette_sample_size(self.silhouette_sample_size)
    }
}
