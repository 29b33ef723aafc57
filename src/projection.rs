//! Principal component projection of the feature matrix
//!
//! Used to draw clusters in two dimensions. Components are found by power
//! iteration with deflation, so no covariance matrix is materialized.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::prelude::*;

use crate::error::{Error, Result};

const MAX_POWER_ITER: usize = 500;
const POWER_TOLERANCE: f64 = 1e-10;

/// Fitted principal components
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    /// Unit components, one per row (n_components, n_features)
    components: Array2<f64>,
    /// Column means of the training data
    mean: Array1<f64>,
    /// Variance captured by each component
    explained_variance: Vec<f64>,
    /// Sum of the per-column variances of the training data
    total_variance: f64,
}

impl Pca {
    /// Fit the top `n_components` components of `data` (n_samples, n_features)
    ///
    /// `n_components` is capped at the feature count. Each component's sign is
    /// fixed so its largest-magnitude loading is positive.
    pub fn fit(data: ArrayView2<f64>, n_components: usize, seed: u64) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::EmptyData);
        }
        if n_components == 0 {
            return Err(Error::invalid_parameter("n_components must be > 0"));
        }

        let n = data.nrows() as f64;
        let d = data.ncols();
        let n_components = n_components.min(d);

        let mean = data.mean_axis(Axis(0)).ok_or(Error::EmptyData)?;
        let mut residual = &data - &mean;
        let total_variance = residual.iter().map(|x| x * x).sum::<f64>() / n;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut components = Array2::zeros((n_components, d));
        let mut explained_variance = Vec::with_capacity(n_components);

        for c in 0..n_components {
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen::<f64>() - 0.5).collect();
            normalize(&mut v);
            let mut eigenvalue = 0.0;

            for _ in 0..MAX_POWER_ITER {
                // X^T (X v) without forming X^T X
                let u = residual.dot(&v);
                let mut next = residual.t().dot(&u);
                eigenvalue = next.dot(&v) / n;

                if normalize(&mut next) < 1e-12 {
                    break;
                }
                let diff: f64 = v.iter().zip(next.iter()).map(|(a, b)| (a - b).abs()).sum();
                v = next;
                if diff < POWER_TOLERANCE {
                    break;
                }
            }

            orient(&mut v);
            for mut row in residual.rows_mut() {
                let proj = row.dot(&v);
                row.scaled_add(-proj, &v);
            }

            components.row_mut(c).assign(&v);
            explained_variance.push(eigenvalue.max(0.0));
        }

        Ok(Self {
            components,
            mean,
            explained_variance,
            total_variance,
        })
    }

    /// Project rows of `data` onto the components
    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        (&data - &self.mean).dot(&self.components.t())
    }

    /// Number of fitted components
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Components as rows (n_components, n_features)
    pub fn components(&self) -> ArrayView2<f64> {
        self.components.view()
    }

    /// Variance captured by each component
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Share of the total variance captured by each component; zeros for constant data
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        self.explained_variance
            .iter()
            .map(|&ev| {
                if self.total_variance > 0.0 {
                    ev / self.total_variance
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Scale to unit length, returning the previous norm
fn normalize(v: &mut Array1<f64>) -> f64 {
    let norm = v.dot(v).sqrt();
    if norm > 0.0 {
        v.mapv_inplace(|x| x / norm);
    }
    norm
}

fn orient(v: &mut Array1<f64>) {
    let pivot = v.iter().fold(0.0f64, |best, &x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
