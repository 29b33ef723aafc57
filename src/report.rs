//! Flat-file exports of a segmentation run

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::data::BookingRecord;
use crate::error::Result;
use crate::features::extras_count;
use crate::insights::BusinessInsights;
use crate::model::ClusterAssignment;
use crate::pipeline::SegmentationOutcome;
use crate::profile::ClusterProfile;

/// Per-record cluster ids, one CSV row per booking
pub const ASSIGNMENTS_FILE: &str = "customer_clusters.csv";
/// Profiles keyed by cluster id
pub const PROFILES_FILE: &str = "cluster_profiles.json";
/// Run summary
pub const SUMMARY_FILE: &str = "analysis_summary.json";
/// Insights grouped by category
pub const INSIGHTS_FILE: &str = "business_insights.json";
/// Feature importances, most separating first
pub const IMPORTANCE_FILE: &str = "feature_importance.json";

/// Dataset-level figures for the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_customers: usize,
    pub num_clusters: usize,
    /// Fraction of completed bookings, in [0, 1]
    pub overall_completion_rate: f64,
    pub average_extras_per_customer: f64,
    pub average_lead_time: f64,
    /// Cluster id to percentage of customers
    pub cluster_distribution: BTreeMap<String, f64>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisSummary {
    /// Summarize `records` with the distribution of `profiles`
    pub fn new(records: &[BookingRecord], profiles: &BTreeMap<usize, ClusterProfile>) -> Self {
        let n = records.len();
        let mean = |f: &dyn Fn(&BookingRecord) -> f64| {
            if n == 0 {
                0.0
            } else {
                records.iter().map(f).sum::<f64>() / n as f64
            }
        };

        Self {
            total_customers: n,
            num_clusters: profiles.len(),
            overall_completion_rate: mean(&|r| if r.booking_complete { 1.0 } else { 0.0 }),
            average_extras_per_customer: mean(&|r| extras_count(r) as f64),
            average_lead_time: mean(&|r| r.purchase_lead as f64),
            cluster_distribution: profiles
                .iter()
                .map(|(cluster, profile)| (cluster.to_string(), profile.percentage))
                .collect(),
            generated_at: Utc::now(),
        }
    }
}

/// Write `record,cluster` rows, one per booking
pub fn write_assignments_csv(path: impl AsRef<Path>, assignment: &ClusterAssignment) -> Result<()> {
    let records: Vec<u64> = (0..assignment.len() as u64).collect();
    let clusters: Vec<u32> = assignment.labels().iter().map(|&c| c as u32).collect();
    let mut df = DataFrame::new(vec![
        Series::new("record", records),
        Series::new("cluster", clusters),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Profiles as one JSON object keyed by cluster id
pub fn write_profiles_json(path: impl AsRef<Path>, profiles: &BTreeMap<usize, ClusterProfile>) -> Result<()> {
    write_json(path, profiles)
}

/// Summary as a single JSON object
pub fn write_summary_json(path: impl AsRef<Path>, summary: &AnalysisSummary) -> Result<()> {
    write_json(path, summary)
}

/// Write every export into `output_dir`, creating it if needed
///
/// # Returns
/// * Paths of the written files
pub fn save_analysis_results(
    output_dir: impl AsRef<Path>,
    records: &[BookingRecord],
    outcome: &SegmentationOutcome,
) -> Result<Vec<PathBuf>> {
    let dir = output_dir.as_ref();
    fs::create_dir_all(dir)?;

    let assignments = dir.join(ASSIGNMENTS_FILE);
    write_assignments_csv(&assignments, &outcome.assignment)?;

    let profiles = dir.join(PROFILES_FILE);
    write_profiles_json(&profiles, &outcome.profiles)?;

    let summary = dir.join(SUMMARY_FILE);
    write_summary_json(&summary, &AnalysisSummary::new(records, &outcome.profiles))?;

    let insights = dir.join(INSIGHTS_FILE);
    write_json(&insights, &BusinessInsights::from_insights(&outcome.insights))?;

    let importance = dir.join(IMPORTANCE_FILE);
    write_json(&importance, &outcome.importance)?;

    let written = vec![assignments, profiles, summary, insights, importance];
    info!(dir = %dir.display(), files = written.len(), "analysis results saved");
    Ok(written)
}
