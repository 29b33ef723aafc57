//! flightseg: airline booking segmentation using K-Means clustering
//!
//! Bookings are loaded from CSV, turned into a standardized feature matrix,
//! clustered with k-means (k picked by silhouette score), then summarized as
//! per-cluster profiles and rule-based business insights.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod insights;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod projection;
pub mod report;
pub mod selection;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ClusterCount, SegmentationConfig};
pub use data::{load_bookings, BookingRecord};
pub use error::{Error, Result};
pub use features::{FeaturePreparer, PreparedFeatures, ZeroVariancePolicy, FEATURE_COLUMNS};
pub use insights::{generate_insights, BusinessInsights, Insight, InsightCategory};
pub use model::{fit_kmeans, silhouette_score, ClusterAssignment, ConvergenceWarning, KMeans, KMeansModel};
pub use pipeline::{run_segmentation, SegmentationOutcome};
pub use profile::{create_cluster_profiles, feature_importance, ClusterProfile, FeatureImportance, RouteCount};
pub use projection::Pca;
pub use report::{save_analysis_results, AnalysisSummary};
pub use selection::{find_optimal_clusters, CandidateScore, ClusterSelection, ClusterSelector, KRange};
pub use viz::generate_visualization_report;
