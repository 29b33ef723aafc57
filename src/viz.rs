//! Visualization functions using Plotters for cluster analysis

use ndarray::ArrayView1;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::pipeline::SegmentationOutcome;
use crate::profile::ClusterProfile;
use crate::projection::Pca;
use crate::selection::ClusterSelection;

/// Silhouette and inertia against k
pub const SELECTION_PLOT: &str = "cluster_selection.png";
/// Clusters on the first two principal components
pub const PCA_PLOT: &str = "cluster_pca.png";
/// Bookings per cluster
pub const SIZES_PLOT: &str = "cluster_sizes.png";
/// Lead time, stay, extras and completion by cluster
pub const CHARACTERISTICS_PLOT: &str = "cluster_characteristics.png";
/// Busiest routes of each cluster
pub const ROUTES_PLOT: &str = "cluster_routes.png";

/// Seed of the power iteration behind the PCA view
const PCA_SEED: u64 = 0;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 10] = [
    RED,
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 140, 0),
    RGBColor(128, 0, 128),
    RGBColor(0, 128, 128),
    RGBColor(139, 69, 19),
    RGBColor(112, 128, 144),
];

fn cluster_color(cluster: usize) -> RGBColor {
    CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()]
}

fn bounds(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi.is_finite() {
        (lo - pad, hi + pad)
    } else {
        (-1.0, 1.0)
    }
}

/// Elbow curve and silhouette curve side by side
pub fn plot_selection_curves(selection: &ClusterSelection, output_path: &Path) -> Result<()> {
    let root = BitMapBackend::new(output_path, (1200, 450)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    let ks: Vec<f64> = selection.scores.iter().map(|s| s.k as f64).collect();
    let (k_min, k_max) = bounds(ks.iter().copied(), 0.5);

    let curves = [
        ("Elbow Method for Optimal k", "Inertia", selection.inertias(), BLUE),
        ("Silhouette Score for Different k", "Silhouette Score", selection.silhouettes(), RED),
    ];

    let best = selection.best_score();
    for (slot, (panel, (title, y_desc, values, color))) in panels.iter().zip(curves).enumerate() {
        let span = values.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1e-6);
        let (y_min, y_max) = bounds(values.iter().copied(), span * 0.1);

        let mut chart = ChartBuilder::on(panel)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(k_min..k_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Number of Clusters (k)")
            .y_desc(y_desc)
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        let points: Vec<(f64, f64)> = ks.iter().copied().zip(values.iter().copied()).collect();
        chart.draw_series(LineSeries::new(points.clone(), &color))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;

        // ring the chosen k on the silhouette panel
        if let (1, Some(best)) = (slot, best) {
            chart.draw_series(std::iter::once(Circle::new(
                (best.k as f64, best.silhouette),
                8,
                BLACK.stroke_width(2),
            )))?;
        }
    }

    root.present()?;
    info!(path = %output_path.display(), "selection curves saved");
    Ok(())
}

/// Clusters projected onto the first two principal components, centroids as squares
///
/// Axis titles carry the share of variance each component explains.
pub fn plot_cluster_pca(outcome: &SegmentationOutcome, output_path: &Path) -> Result<()> {
    let features = outcome.features.matrix.view();
    let pca = Pca::fit(features, 2, PCA_SEED)?;
    let points = pca.transform(features);
    let centroids = pca.transform(outcome.model.centroids.view());
    let ratio = pca.explained_variance_ratio();

    let (x_min, x_max) = bounds(points.column(0).iter().copied(), 0.5);
    let (y_min, y_max) = bounds(points.rows().into_iter().map(|r| plane_point(r).1), 0.5);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Clusters (PCA)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(format!(
            "First Principal Component ({:.2}% variance)",
            ratio[0] * 100.0
        ))
        .y_desc(format!(
            "Second Principal Component ({:.2}% variance)",
            ratio.get(1).copied().unwrap_or(0.0) * 100.0
        ))
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(
        points
            .rows()
            .into_iter()
            .zip(outcome.model.labels.iter())
            .map(|(row, &cluster)| Circle::new(plane_point(row), 3, cluster_color(cluster).mix(0.6).filled())),
    )?;

    for (cluster, centroid) in centroids.rows().into_iter().enumerate() {
        let (cx, cy) = plane_point(centroid);
        let color = cluster_color(cluster);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)],
                color.filled(),
            )))?
            .label(format!("Cluster {cluster} Centroid"))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "cluster PCA view saved");
    Ok(())
}

/// First two coordinates of a projected row; a single component is drawn at y = 0
fn plane_point(row: ArrayView1<f64>) -> (f64, f64) {
    (row[0], row.get(1).copied().unwrap_or(0.0))
}

/// One labelled bar
struct Bar {
    label: String,
    value: f64,
    color: RGBColor,
}

fn cluster_bars(profiles: &BTreeMap<usize, ClusterProfile>, metric: impl Fn(&ClusterProfile) -> f64) -> Vec<Bar> {
    profiles
        .iter()
        .map(|(&cluster, profile)| Bar {
            label: cluster.to_string(),
            value: metric(profile),
            color: cluster_color(cluster),
        })
        .collect()
}

/// Bar chart of customers per cluster
pub fn plot_cluster_sizes(profiles: &BTreeMap<usize, ClusterProfile>, output_path: &Path) -> Result<()> {
    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let bars = cluster_bars(profiles, |p| p.size as f64);
    draw_bar_panel(&root, "Cluster Sizes", "Cluster ID", "Number of Customers", &bars)?;

    root.present()?;
    info!(path = %output_path.display(), "cluster size chart saved");
    Ok(())
}

/// Four panels: lead time, completion rate, extras and party size per cluster
pub fn plot_cluster_characteristics(profiles: &BTreeMap<usize, ClusterProfile>, output_path: &Path) -> Result<()> {
    let root = BitMapBackend::new(output_path, (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    type Metric = fn(&ClusterProfile) -> f64;
    let metrics: [(&str, &str, Metric); 4] = [
        ("Average Purchase Lead Time", "Days", |p| p.avg_lead_time),
        ("Booking Completion Rate", "Percent", |p| p.completion_rate),
        ("Average Extras per Booking", "Extras", |p| p.avg_extras),
        ("Average Passengers", "Passengers", |p| p.avg_passengers),
    ];

    for (panel, (title, y_desc, metric)) in panels.iter().zip(metrics) {
        draw_bar_panel(panel, title, "Cluster ID", y_desc, &cluster_bars(profiles, metric))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "cluster characteristics saved");
    Ok(())
}

/// One panel per cluster with its most booked routes
pub fn plot_top_routes(profiles: &BTreeMap<usize, ClusterProfile>, output_path: &Path) -> Result<()> {
    let rows = profiles.len().div_ceil(2).max(1);
    let root = BitMapBackend::new(output_path, (1400, 400 * rows as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((rows, 2));

    for (panel, (&cluster, profile)) in panels.iter().zip(profiles) {
        let bars: Vec<Bar> = profile
            .top_routes
            .iter()
            .map(|r| Bar {
                label: r.route.clone(),
                value: r.count as f64,
                color: cluster_color(cluster),
            })
            .collect();
        let title = format!("Cluster {cluster}: Top Routes");
        draw_bar_panel(panel, &title, "Route", "Number of Bookings", &bars)?;
    }

    root.present()?;
    info!(path = %output_path.display(), "route chart saved");
    Ok(())
}

fn draw_bar_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    bars: &[Bar],
) -> Result<()> {
    let n = bars.len().max(1) as f64;
    let max_value = bars.iter().fold(0.0f64, |m, bar| m.max(bar.value)).max(1e-6);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..(max_value * 1.1))?;

    // ticks off the bar centers get no label
    let label_at = |x: &f64| {
        let slot = x.round();
        if (x - slot).abs() > 1e-6 || slot < 0.0 {
            return String::new();
        }
        bars.get(slot as usize).map(|bar| bar.label.clone()).unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len().max(1))
        .x_label_formatter(&label_at)
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(slot, bar)| {
        let x = slot as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, bar.value)], bar.color.filled())
    }))?;

    Ok(())
}

/// Render every chart for a run into `output_dir`
///
/// # Returns
/// * Paths of the written images
pub fn generate_visualization_report(outcome: &SegmentationOutcome, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let selection = output_dir.join(SELECTION_PLOT);
    plot_selection_curves(&outcome.selection, &selection)?;

    let pca = output_dir.join(PCA_PLOT);
    plot_cluster_pca(outcome, &pca)?;

    let sizes = output_dir.join(SIZES_PLOT);
    plot_cluster_sizes(&outcome.profiles, &sizes)?;

    let characteristics = output_dir.join(CHARACTERISTICS_PLOT);
    plot_cluster_characteristics(&outcome.profiles, &characteristics)?;

    let routes = output_dir.join(ROUTES_PLOT);
    plot_top_routes(&outcome.profiles, &routes)?;

    Ok(vec![selection, pca, sizes, characteristics, routes])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterCount, SegmentationConfig};
    use crate::data::BookingRecord;
    use crate::error::Error;
    use crate::pipeline::run_segmentation;
    use plotters::style::{FontDesc, FontFamily, FontStyle};
    use tempfile::tempdir;

    fn create_test_outcome() -> SegmentationOutcome {
        let records: Vec<BookingRecord> = (0..12u32)
            .map(|i| BookingRecord {
                num_passengers: 1 + i % 3,
                purchase_lead: if i < 6 { 3 + i } else { 120 + i },
                length_of_stay: 2 + i,
                flight_duration: if i < 6 { 1.5 } else { 9.0 },
                sales_channel: (if i % 2 == 0 { "Internet" } else { "Mobile" }).to_string(),
                trip_type: (if i < 6 { "OneWay" } else { "RoundTrip" }).to_string(),
                flight_hour: if i % 2 == 0 { 7 } else { 13 },
                flight_day: (if i < 6 { "Wed" } else { "Sat" }).to_string(),
                route: (if i % 3 == 0 { "PENTPE" } else { "AKLKUL" }).to_string(),
                wants_extra_baggage: i >= 6,
                ..Default::default()
            })
            .collect();
        let config = SegmentationConfig::default().cluster_count(ClusterCount::Auto(crate::KRange::new(2, 3)));
        run_segmentation(&records, &config).unwrap()
    }

    fn fonts_available() -> bool {
        FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal)
            .box_size("Cluster 0")
            .is_ok()
    }

    /// A rendered chart must exist; without any system font the text stage fails as a plot error
    fn assert_rendered(result: Result<()>, path: &Path) {
        if fonts_available() {
            result.unwrap();
            assert!(path.exists());
            assert!(std::fs::metadata(path).unwrap().len() > 0);
        } else {
            assert!(matches!(result, Err(Error::Plot { .. })));
        }
    }

    #[test]
    fn test_bounds_padding() {
        assert_eq!(bounds([1.0, 3.0, 2.0].into_iter(), 0.5), (0.5, 3.5));
        assert_eq!(bounds(std::iter::empty(), 0.5), (-1.0, 1.0));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(cluster_color(0), cluster_color(CLUSTER_COLORS.len()));
    }

    #[test]
    fn test_cluster_bars_follow_profiles() {
        let outcome = create_test_outcome();
        let bars = cluster_bars(&outcome.profiles, |p| p.size as f64);
        assert_eq!(bars.len(), outcome.n_clusters());
        assert_eq!(bars[0].label, "0");
        let total: f64 = bars.iter().map(|b| b.value).sum();
        assert_eq!(total, 12.0);
        assert_eq!(bars[1].color, cluster_color(1));
    }

    #[test]
    fn test_plot_cluster_sizes() {
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_sizes.png");

        assert_rendered(plot_cluster_sizes(&outcome.profiles, &output_path), &output_path);
    }

    #[test]
    fn test_plot_cluster_characteristics() {
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_characteristics.png");

        assert_rendered(plot_cluster_characteristics(&outcome.profiles, &output_path), &output_path);
    }

    #[test]
    fn test_plot_top_routes() {
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_routes.png");

        assert_rendered(plot_top_routes(&outcome.profiles, &output_path), &output_path);
    }

    #[test]
    fn test_plot_cluster_pca() {
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_pca.png");

        assert_rendered(plot_cluster_pca(&outcome, &output_path), &output_path);
    }

    #[test]
    fn test_plot_selection_curves() {
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_selection.png");

        assert_rendered(plot_selection_curves(&outcome.selection, &output_path), &output_path);
    }

    #[test]
    fn test_generate_visualization_report() {
        if !fonts_available() {
            return;
        }
        let outcome = create_test_outcome();
        let temp_dir = tempdir().unwrap();

        let written = generate_visualization_report(&outcome, temp_dir.path()).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));
    }
}
