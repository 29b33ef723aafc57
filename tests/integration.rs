//! Integration tests for flightseg

use flightseg::report::{ASSIGNMENTS_FILE, IMPORTANCE_FILE, INSIGHTS_FILE, PROFILES_FILE, SUMMARY_FILE};
use flightseg::{
    load_bookings, run_segmentation, save_analysis_results, ClusterCount, Error, KRange, SegmentationConfig,
    ZeroVariancePolicy,
};
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "num_passengers,sales_channel,trip_type,purchase_lead,length_of_stay,flight_hour,flight_day,route,booking_origin,wants_extra_baggage,wants_preferred_seat,wants_in_flight_meals,flight_duration,booking_complete";

/// Twenty long-haul family bookings followed by twenty short-haul solo trips
fn booking_rows() -> Vec<String> {
    let family = (0..20).map(|i| {
        format!(
            "{},Internet,RoundTrip,{},20,7,Sat,AKLKUL,New Zealand,1,1,{},9.5,1",
            3 + i % 2,
            150 + i * 5,
            u8::from(i % 3 != 0)
        )
    });
    let solo = (0..20).map(|i| {
        format!(
            "1,Mobile,OneWay,{},3,13,Wed,PENSYD,Malaysia,0,0,0,1.5,{}",
            2 + i % 4,
            u8::from(i % 2 == 0)
        )
    });
    family.chain(solo).collect()
}

/// Create a test CSV file from a header and rows
fn create_test_csv(header: &str, rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", header).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file
}

fn auto_config() -> SegmentationConfig {
    SegmentationConfig::default().cluster_count(ClusterCount::Auto(KRange::new(2, 5)))
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv(HEADER, &booking_rows());
    let records = load_bookings(test_file.path()).unwrap();
    assert_eq!(records.len(), 40);
    assert_eq!(records[0].booking_origin, "New Zealand");
    assert!(records[0].wants_extra_baggage);

    let outcome = run_segmentation(&records, &auto_config()).unwrap();

    // two well separated groups
    assert_eq!(outcome.n_clusters(), 2);
    assert_eq!(outcome.selection.scores.len(), 4);
    let best = outcome.silhouette();
    assert!(outcome.selection.scores.iter().all(|s| s.silhouette <= best));

    // every booking assigned, totals preserved
    assert_eq!(outcome.assignment.len(), 40);
    let sizes: Vec<usize> = outcome.profiles.values().map(|p| p.size).collect();
    assert_eq!(sizes, vec![20, 20]);
    let pct: f64 = outcome.profiles.values().map(|p| p.percentage).sum();
    assert!((pct - 100.0).abs() < 1e-9);

    let family = outcome.assignment.labels()[0];
    assert!(outcome.assignment.labels()[..20].iter().all(|&c| c == family));
    assert!(outcome.assignment.labels()[20..].iter().all(|&c| c != family));
    assert_eq!(outcome.profiles[&family].travel_type, "Long_Haul");
}

#[test]
fn test_save_analysis_results() {
    let test_file = create_test_csv(HEADER, &booking_rows());
    let records = load_bookings(test_file.path()).unwrap();
    let outcome = run_segmentation(&records, &auto_config()).unwrap();

    let out_dir = tempdir().unwrap();
    let written = save_analysis_results(out_dir.path().join("results"), &records, &outcome).unwrap();
    assert_eq!(written.len(), 5);
    assert!(written.iter().all(|p| p.exists()));

    let results = out_dir.path().join("results");
    let csv = fs::read_to_string(results.join(ASSIGNMENTS_FILE)).unwrap();
    assert_eq!(csv.lines().next(), Some("record,cluster"));
    assert_eq!(csv.lines().count(), 41);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results.join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["total_customers"], 40);
    assert_eq!(summary["num_clusters"], 2);
    assert_eq!(summary["cluster_distribution"]["0"], 50.0);

    let profiles: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results.join(PROFILES_FILE)).unwrap()).unwrap();
    assert_eq!(profiles["1"]["size"], 20);
    let routes = profiles["1"]["top_routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["count"], 20);

    let insights: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results.join(INSIGHTS_FILE)).unwrap()).unwrap();
    assert!(insights["operational_improvements"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m.as_str().unwrap().contains("Family travelers")));

    let importance: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results.join(IMPORTANCE_FILE)).unwrap()).unwrap();
    assert_eq!(importance.as_array().unwrap().len(), 11);
}

#[test]
fn test_prediction() {
    let test_file = create_test_csv(HEADER, &booking_rows());
    let records = load_bookings(test_file.path()).unwrap();
    let outcome = run_segmentation(&records, &auto_config()).unwrap();

    let new_rows = vec![
        "4,Internet,RoundTrip,180,21,7,Sat,AKLKUL,New Zealand,1,1,1,9.5,1".to_string(),
        "1,Mobile,OneWay,3,3,13,Wed,PENSYD,Malaysia,0,0,0,1.5,0".to_string(),
    ];
    let new_file = create_test_csv(HEADER, &new_rows);
    let new_records = load_bookings(new_file.path()).unwrap();

    let predicted = outcome.predict(&new_records).unwrap();
    assert_eq!(predicted[0], outcome.assignment.labels()[0]);
    assert_eq!(predicted[1], outcome.assignment.labels()[39]);

    // scoring the training data reproduces its labels
    assert_eq!(outcome.predict(&records).unwrap(), outcome.assignment.labels().to_vec());
}

#[test]
fn test_prediction_rejects_unseen_category() {
    let test_file = create_test_csv(HEADER, &booking_rows());
    let records = load_bookings(test_file.path()).unwrap();
    let outcome = run_segmentation(&records, &auto_config()).unwrap();

    let new_file = create_test_csv(
        HEADER,
        &["1,Phone,OneWay,3,3,13,Wed,PENSYD,Malaysia,0,0,0,1.5,0".to_string()],
    );
    let new_records = load_bookings(new_file.path()).unwrap();
    let err = outcome.predict(&new_records).unwrap_err();
    assert!(matches!(err, Error::UnknownCategory { ref value, .. } if value == "Phone"));
}

#[test]
fn test_missing_columns() {
    let header = HEADER.replace(",booking_complete", "");
    let rows: Vec<String> = booking_rows()
        .into_iter()
        .map(|row| row[..row.rfind(',').unwrap()].to_string())
        .collect();
    let test_file = create_test_csv(&header, &rows);

    let err = load_bookings(test_file.path()).unwrap_err();
    match err {
        Error::MissingColumns { columns } => assert_eq!(columns, vec!["booking_complete".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_flag_value() {
    let mut rows = booking_rows();
    rows[3] = "1,Mobile,OneWay,3,3,13,Wed,PENSYD,Malaysia,2,0,0,1.5,0".to_string();
    let test_file = create_test_csv(HEADER, &rows);

    let err = load_bookings(test_file.path()).unwrap_err();
    assert!(err.is_data_error());
}

#[test]
fn test_deterministic_runs() {
    let test_file = create_test_csv(HEADER, &booking_rows());
    let records = load_bookings(test_file.path()).unwrap();
    let config = SegmentationConfig::default()
        .cluster_count(ClusterCount::Fixed(4))
        .seed(7);

    let a = run_segmentation(&records, &config).unwrap();
    let b = run_segmentation(&records, &config).unwrap();
    assert_eq!(a.assignment, b.assignment);
    assert_eq!(a.profiles, b.profiles);
    assert_eq!(a.selection, b.selection);
}

#[test]
fn test_insufficient_distinct_bookings() {
    let rows: Vec<String> = booking_rows().into_iter().take(2).collect();
    let test_file = create_test_csv(HEADER, &rows);
    let records = load_bookings(test_file.path()).unwrap();

    let config = SegmentationConfig::default()
        .cluster_count(ClusterCount::Fixed(3))
        .zero_variance(ZeroVariancePolicy::Center);
    let err = run_segmentation(&records, &config).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { k: 3, distinct: 2 }));
}
