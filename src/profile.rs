//! Per-cluster descriptive profiles and feature importance

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::BookingRecord;
use crate::error::{Error, Result};
use crate::features::{extras_count, LeadCategory, TravelType};
use crate::model::ClusterAssignment;

/// Categorical mode reported for a cluster with no members
pub const UNKNOWN: &str = "Unknown";

/// Routes listed per cluster in [`ClusterProfile::top_routes`]
pub const TOP_ROUTES: usize = 10;

/// Bookings of one route within a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCount {
    pub route: String,
    pub count: usize,
}

/// Aggregate statistics of one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub size: usize,
    /// Share of all records, in percent
    pub percentage: f64,
    pub avg_passengers: f64,
    pub avg_lead_time: f64,
    pub avg_stay_length: f64,
    pub avg_flight_duration: f64,
    pub avg_extras: f64,
    pub baggage_rate: f64,
    pub seat_rate: f64,
    pub meal_rate: f64,
    pub completion_rate: f64,
    pub top_sales_channel: String,
    pub top_trip_type: String,
    pub top_origin: String,
    pub lead_category: String,
    pub travel_type: String,
    /// Most booked routes, busiest first; empty for an empty cluster
    pub top_routes: Vec<RouteCount>,
}

/// Build one profile per cluster id in `0..n_clusters`, empty clusters included
pub fn create_cluster_profiles(
    records: &[BookingRecord],
    assignment: &ClusterAssignment,
) -> Result<BTreeMap<usize, ClusterProfile>> {
    if records.len() != assignment.len() {
        return Err(Error::invalid_parameter(format!(
            "{} records but {} cluster assignments",
            records.len(),
            assignment.len()
        )));
    }

    let mut members: Vec<Vec<&BookingRecord>> = vec![Vec::new(); assignment.n_clusters()];
    for (record, &cluster) in records.iter().zip(assignment.labels()) {
        members[cluster].push(record);
    }

    Ok(members
        .iter()
        .enumerate()
        .map(|(cluster, group)| (cluster, profile_group(group, records.len())))
        .collect())
}

fn profile_group(group: &[&BookingRecord], total: usize) -> ClusterProfile {
    let size = group.len();
    let mean = |f: &dyn Fn(&BookingRecord) -> f64| -> f64 {
        if size == 0 {
            0.0
        } else {
            group.iter().map(|r| f(r)).sum::<f64>() / size as f64
        }
    };
    let rate = |f: &dyn Fn(&BookingRecord) -> bool| mean(&|r| if f(r) { 1.0 } else { 0.0 }) * 100.0;

    ClusterProfile {
        size,
        percentage: if total == 0 {
            0.0
        } else {
            size as f64 / total as f64 * 100.0
        },
        avg_passengers: mean(&|r| r.num_passengers as f64),
        avg_lead_time: mean(&|r| r.purchase_lead as f64),
        avg_stay_length: mean(&|r| r.length_of_stay as f64),
        avg_flight_duration: mean(&|r| r.flight_duration),
        avg_extras: mean(&|r| extras_count(r) as f64),
        baggage_rate: rate(&|r| r.wants_extra_baggage),
        seat_rate: rate(&|r| r.wants_preferred_seat),
        meal_rate: rate(&|r| r.wants_in_flight_meals),
        completion_rate: rate(&|r| r.booking_complete),
        top_sales_channel: mode(group.iter().map(|r| r.sales_channel.as_str())),
        top_trip_type: mode(group.iter().map(|r| r.trip_type.as_str())),
        top_origin: mode(group.iter().map(|r| r.booking_origin.as_str())),
        lead_category: mode(
            group
                .iter()
                .map(|r| LeadCategory::from_lead_days(r.purchase_lead).as_str()),
        ),
        travel_type: mode(
            group
                .iter()
                .map(|r| TravelType::from_duration(r.flight_duration).as_str()),
        ),
        top_routes: top_routes(group.iter().map(|r| r.route.as_str()), TOP_ROUTES),
    }
}

/// Most frequent value; ties go to the smallest value, no values gives [`UNKNOWN`]
pub fn mode<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }

    best.map_or_else(|| UNKNOWN.to_string(), |(value, _)| value.to_string())
}

/// The `limit` most frequent values with their counts; ties go to the smaller value
pub fn top_routes<'a, I>(routes: I, limit: usize) -> Vec<RouteCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for route in routes {
        *counts.entry(route).or_insert(0) += 1;
    }

    let mut ranked: Vec<RouteCount> = counts
        .into_iter()
        .map(|(route, count)| RouteCount {
            route: route.to_string(),
            count,
        })
        .collect();
    // stable sort keeps ascending route order among equal counts
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// How strongly one feature separates the clusters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Between-cluster share of the feature's variance (eta squared), in [0, 1]
    pub importance: f64,
}

/// Eta squared of every feature column, most separating first
pub fn feature_importance(
    data: ArrayView2<f64>,
    assignment: &ClusterAssignment,
    feature_names: &[String],
) -> Result<Vec<FeatureImportance>> {
    if data.nrows() != assignment.len() {
        return Err(Error::invalid_parameter(format!(
            "{} feature rows but {} cluster assignments",
            data.nrows(),
            assignment.len()
        )));
    }
    if data.ncols() != feature_names.len() {
        return Err(Error::invalid_parameter(format!(
            "{} feature columns but {} names",
            data.ncols(),
            feature_names.len()
        )));
    }

    let sizes = assignment.cluster_sizes();
    let n = data.nrows() as f64;
    let mut importance: Vec<FeatureImportance> = data
        .columns()
        .into_iter()
        .zip(feature_names)
        .map(|(column, name)| {
            let overall = column.sum() / n;
            let mut cluster_sums = vec![0.0; sizes.len()];
            for (&value, &label) in column.iter().zip(assignment.labels()) {
                cluster_sums[label] += value;
            }

            let total_ss: f64 = column.iter().map(|v| (v - overall).powi(2)).sum();
            let between_ss: f64 = cluster_sums
                .iter()
                .zip(&sizes)
                .filter(|(_, &size)| size > 0)
                .map(|(&sum, &size)| size as f64 * (sum / size as f64 - overall).powi(2))
                .sum();

            FeatureImportance {
                feature: name.clone(),
                importance: if total_ss > 0.0 {
                    (between_ss / total_ss).clamp(0.0, 1.0)
                } else {
                    0.0
                },
            }
        })
        .collect();

    // stable sort keeps column order among equal scores
    importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(importance)
}
