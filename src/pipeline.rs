//! End-to-end segmentation: features, k search, fit, profiles, insights

use std::collections::BTreeMap;
use tracing::info;

use crate::config::SegmentationConfig;
use crate::data::BookingRecord;
use crate::error::Result;
use crate::features::{FeaturePreparer, PreparedFeatures};
use crate::insights::{generate_insights, Insight};
use crate::model::{ClusterAssignment, ConvergenceWarning, KMeansModel};
use crate::profile::{create_cluster_profiles, feature_importance, ClusterProfile, FeatureImportance};
use crate::selection::ClusterSelection;

/// Every artifact of one segmentation run
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    pub features: PreparedFeatures,
    pub selection: ClusterSelection,
    pub model: KMeansModel,
    pub assignment: ClusterAssignment,
    pub profiles: BTreeMap<usize, ClusterProfile>,
    pub insights: Vec<Insight>,
    pub importance: Vec<FeatureImportance>,
    /// Candidate or final fits that stopped at the iteration cap
    pub warnings: Vec<ConvergenceWarning>,
}

impl SegmentationOutcome {
    /// Cluster count of the final model
    pub fn n_clusters(&self) -> usize {
        self.model.n_clusters
    }

    /// Silhouette of the chosen k as scored during selection
    pub fn silhouette(&self) -> f64 {
        self.selection.best_score().map_or(0.0, |s| s.silhouette)
    }

    /// Assign new bookings with the fitted encoders, scaler and centroids
    pub fn predict(&self, records: &[BookingRecord]) -> Result<Vec<usize>> {
        let matrix = self.features.transform.transform(records)?;
        self.model.predict_batch(matrix.view())
    }
}

/// Run the full pipeline over in-memory records
///
/// Nothing is returned unless every stage succeeds.
pub fn run_segmentation(records: &[BookingRecord], config: &SegmentationConfig) -> Result<SegmentationOutcome> {
    config.validate()?;

    let features = FeaturePreparer::new(config.zero_variance).prepare(records)?;

    let selector = config.selector();
    let selection = selector.select(features.matrix.view())?;

    let model = selector.kmeans(selection.best_k).fit(features.matrix.view())?;
    let assignment = model.assignment();
    info!(
        k = model.n_clusters,
        inertia = model.inertia,
        n_iter = model.n_iter,
        sizes = ?assignment.cluster_sizes(),
        "k-means fitted"
    );

    let mut warnings: Vec<ConvergenceWarning> = selection
        .scores
        .iter()
        .filter(|s| !s.converged && s.k != selection.best_k)
        .map(|s| ConvergenceWarning {
            k: s.k,
            max_iter: config.max_iter,
        })
        .collect();
    // each capped fit was already logged by KMeans::fit
    warnings.extend(model.convergence_warning());

    let profiles = create_cluster_profiles(records, &assignment)?;
    let insights = generate_insights(&profiles, None);
    let importance = feature_importance(features.matrix.view(), &assignment, &features.feature_names)?;
    info!(
        profiles = profiles.len(),
        insights = insights.len(),
        warnings = warnings.len(),
        "segmentation complete"
    );

    Ok(SegmentationOutcome {
        features,
        selection,
        model,
        assignment,
        profiles,
        insights,
        importance,
        warnings,
    })
}
