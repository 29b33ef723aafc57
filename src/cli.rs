//! Command-line interface definitions and argument parsing

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ClusterCount, SegmentationConfig};
use crate::error::Result;
use crate::features::ZeroVariancePolicy;
use crate::selection::KRange;

/// Airline booking segmentation using K-Means with silhouette-based k selection
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the booking CSV file
    #[arg(short, long, default_value = "customer_booking.csv")]
    pub input: PathBuf,

    /// Directory for CSV, JSON and PNG outputs
    #[arg(short, long, default_value = "results")]
    pub output_dir: PathBuf,

    /// JSON configuration file; explicit flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Smallest k to try
    #[arg(long)]
    pub k_min: Option<usize>,

    /// Largest k to try
    #[arg(long)]
    pub k_max: Option<usize>,

    /// Use this number of clusters instead of searching
    #[arg(short = 'k', long, conflicts_with_all = ["k_min", "k_max"])]
    pub clusters: Option<usize>,

    /// Random seed for centroid seeding and silhouette sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// K-Means restarts per k
    #[arg(long)]
    pub n_init: Option<usize>,

    /// Maximum iterations for K-Means algorithm
    #[arg(long)]
    pub max_iters: Option<usize>,

    /// Score silhouettes on a random sample of this many bookings
    #[arg(long)]
    pub silhouette_sample: Option<usize>,

    /// Center constant feature columns instead of rejecting them
    #[arg(long)]
    pub center_constant_columns: bool,

    /// Skip PNG charts
    #[arg(long)]
    pub no_plots: bool,

    /// Prediction mode: print the segment of every booking in this CSV
    #[arg(short, long)]
    pub predict: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration: defaults, then `--config`, then flags
    pub fn to_config(&self) -> Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::from_json_file(path)?,
            None => SegmentationConfig::default(),
        };

        if let Some(k) = self.clusters {
            config.cluster_count = ClusterCount::Fixed(k);
        } else if self.k_min.is_some() || self.k_max.is_some() {
            let base = match config.cluster_count {
                ClusterCount::Auto(range) => range,
                ClusterCount::Fixed(_) => KRange::default(),
            };
            config.cluster_count = ClusterCount::Auto(KRange::new(
                self.k_min.unwrap_or(base.min),
                self.k_max.unwrap_or(base.max),
            ));
        }

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n_init) = self.n_init {
            config.n_init = n_init;
        }
        if let Some(max_iter) = self.max_iters {
            config.max_iter = max_iter;
        }
        if self.silhouette_sample.is_some() {
            config.silhouette_sample_size = self.silhouette_sample;
        }
        if self.center_constant_columns {
            config.zero_variance = ZeroVariancePolicy::Center;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_give_default_config() {
        let args = Args::parse_from(["flightseg"]);
        assert_eq!(args.input, PathBuf::from("customer_booking.csv"));
        assert!(!args.no_plots);
        assert_eq!(args.to_config().unwrap(), SegmentationConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let args = Args::parse_from([
            "flightseg",
            "--k-max",
            "6",
            "--seed",
            "7",
            "--n-init",
            "3",
            "--center-constant-columns",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.cluster_count, ClusterCount::Auto(KRange::new(2, 6)));
        assert_eq!(config.seed, 7);
        assert_eq!(config.n_init, 3);
        assert_eq!(config.max_iter, 300);
        assert_eq!(config.zero_variance, ZeroVariancePolicy::Center);
    }

    #[test]
    fn test_fixed_clusters() {
        let args = Args::parse_from(["flightseg", "-k", "4"]);
        assert_eq!(args.to_config().unwrap().cluster_count, ClusterCount::Fixed(4));

        assert!(Args::try_parse_from(["flightseg", "-k", "4", "--k-min", "2"]).is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"cluster_count": {{"fixed": 3}}, "seed": 11, "max_iter": 50}}"#).unwrap();

        let path = file.path().to_str().unwrap();
        let args = Args::parse_from(["flightseg", "--config", path, "--seed", "5"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.cluster_count, ClusterCount::Fixed(3));
        assert_eq!(config.seed, 5);
        assert_eq!(config.max_iter, 50);
    }

    #[test]
    fn test_invalid_options() {
        let args = Args::parse_from(["flightseg", "--k-min", "1"]);
        assert!(matches!(args.to_config(), Err(Error::InvalidParameter { .. })));

        let args = Args::parse_from(["flightseg", "--n-init", "0"]);
        assert!(args.to_config().is_err());
    }
}
