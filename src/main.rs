//! flightseg: airline booking segmentation CLI
//!
//! Orchestrates data loading, cluster selection, profiling, exports,
//! visualization and prediction.

use anyhow::{Context, Result};
use clap::Parser;
use flightseg::{load_bookings, report, run_segmentation, viz, Args, BusinessInsights, SegmentationOutcome};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_target(false)
        .init();

    if let Some(ref predict_path) = args.predict {
        run_prediction_mode(&args, predict_path)?;
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

/// Fit on the training file, then assign every booking of `predict_path`
fn run_prediction_mode(args: &Args, predict_path: &std::path::Path) -> Result<()> {
    println!("=== Prediction Mode ===");
    let start_time = Instant::now();

    let config = args.to_config()?;
    let records = load_bookings(&args.input)
        .with_context(|| format!("loading training data from {}", args.input.display()))?;
    let outcome = run_segmentation(&records, &config)?;

    let new_records = load_bookings(predict_path)
        .with_context(|| format!("loading bookings to score from {}", predict_path.display()))?;
    let segments = outcome.predict(&new_records)?;

    println!(
        "Model: {} clusters fitted on {} bookings",
        outcome.n_clusters(),
        records.len()
    );
    println!("\n{:>8}  {:>7}  {:<16}  {:<12}", "booking", "cluster", "sales_channel", "trip_type");
    for (i, (record, cluster)) in new_records.iter().zip(&segments).enumerate() {
        println!(
            "{:>8}  {:>7}  {:<16}  {:<12}",
            i, cluster, record.sales_channel, record.trip_type
        );
    }

    println!("\nCluster context:");
    for (cluster, profile) in &outcome.profiles {
        let assigned = segments.iter().filter(|&&c| c == *cluster).count();
        println!(
            "  Cluster {}: {} new bookings, training size {} ({:.1}%)",
            cluster, assigned, profile.size, profile.percentage
        );
    }

    println!("\nProcessing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Run full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Booking Segmentation Pipeline ===\n");
    let start_time = Instant::now();

    let config = args.to_config()?;
    let records = load_bookings(&args.input)
        .with_context(|| format!("loading bookings from {}", args.input.display()))?;
    println!("✓ Data loaded: {} bookings", records.len());

    let outcome = run_segmentation(&records, &config)?;
    print_selection(&outcome);
    print_cluster_statistics(&outcome);
    print_insights(&outcome);

    let written = report::save_analysis_results(&args.output_dir, &records, &outcome)
        .with_context(|| format!("writing results to {}", args.output_dir.display()))?;
    println!("\n✓ Results saved to {}", args.output_dir.display());
    for path in &written {
        println!("  {}", path.display());
    }

    if !args.no_plots {
        let charts = viz::generate_visualization_report(&outcome, &args.output_dir)?;
        println!("✓ Visualizations generated: {}", charts.len());
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn print_selection(outcome: &SegmentationOutcome) {
    println!("\n=== Cluster Selection ===");
    println!("{:>4}  {:>14}  {:>10}", "k", "inertia", "silhouette");
    for score in &outcome.selection.scores {
        let marker = if score.k == outcome.selection.best_k { " <" } else { "" };
        println!(
            "{:>4}  {:>14.2}  {:>10.3}{}",
            score.k, score.inertia, score.silhouette, marker
        );
    }
    println!(
        "Chosen k = {} (silhouette {:.3})",
        outcome.n_clusters(),
        outcome.silhouette()
    );
    for warning in &outcome.warnings {
        println!("  warning: {}", warning);
    }
}

fn print_cluster_statistics(outcome: &SegmentationOutcome) {
    println!("\n=== Cluster Statistics ===");
    for (cluster, profile) in &outcome.profiles {
        println!(
            "Cluster {}: {} bookings ({:.1}%)",
            cluster, profile.size, profile.percentage
        );
        println!(
            "  lead {:.0}d, stay {:.1}d, passengers {:.1}, extras {:.2}, completion {:.1}%",
            profile.avg_lead_time,
            profile.avg_stay_length,
            profile.avg_passengers,
            profile.avg_extras,
            profile.completion_rate
        );
        println!(
            "  top channel {}, trip {}, origin {}, {} / {}",
            profile.top_sales_channel,
            profile.top_trip_type,
            profile.top_origin,
            profile.lead_category,
            profile.travel_type
        );
        if !profile.top_routes.is_empty() {
            let routes: Vec<String> = profile
                .top_routes
                .iter()
                .take(3)
                .map(|r| format!("{} ({})", r.route, r.count))
                .collect();
            println!("  top routes {}", routes.join(", "));
        }
    }

    println!("\nMost separating features:");
    for item in outcome.importance.iter().take(5) {
        println!("  {:<32} {:.3}", item.feature, item.importance);
    }
}

fn print_insights(outcome: &SegmentationOutcome) {
    let grouped = BusinessInsights::from_insights(&outcome.insights);
    if grouped.is_empty() {
        println!("\nNo business insights triggered");
        return;
    }

    let sections = [
        ("Revenue opportunities", &grouped.revenue_opportunities),
        ("Marketing strategies", &grouped.marketing_strategies),
        ("Operational improvements", &grouped.operational_improvements),
        ("Risk factors", &grouped.risk_factors),
    ];
    println!("\n=== Business Insights ===");
    for (title, messages) in sections {
        if messages.is_empty() {
            continue;
        }
        println!("{}:", title);
        for message in messages {
            println!("  • {}", message);
        }
    }
}
