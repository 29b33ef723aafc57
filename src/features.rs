//! Feature derivation, label encoding and standardization

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::data::BookingRecord;
use crate::error::{Error, Result};

/// Departure hours treated as peak travel
pub const PEAK_HOURS: [u32; 7] = [6, 7, 8, 17, 18, 19, 20];

/// Flight days treated as weekend travel
pub const WEEKEND_DAYS: [&str; 2] = ["Sat", "Sun"];

/// Column order of the clustering feature matrix
pub const FEATURE_COLUMNS: [&str; 11] = [
    "num_passengers",
    "purchase_lead",
    "length_of_stay",
    "flight_duration",
    "extras_count",
    "sales_channel_encoded",
    "trip_type_encoded",
    "booking_lead_category_encoded",
    "travel_type_encoded",
    "is_peak_hour",
    "is_weekend",
];

/// Booking lead bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeadCategory {
    #[serde(rename = "Last_Minute")]
    LastMinute,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Early_Planner")]
    EarlyPlanner,
}

impl LeadCategory {
    /// Bucket a purchase lead: `<= 7` last minute, `8..=30` moderate, above that early
    pub fn from_lead_days(days: u32) -> Self {
        match days {
            0..=7 => Self::LastMinute,
            8..=30 => Self::Moderate,
            _ => Self::EarlyPlanner,
        }
    }

    /// Bucket name as exported
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastMinute => "Last_Minute",
            Self::Moderate => "Moderate",
            Self::EarlyPlanner => "Early_Planner",
        }
    }
}

impl fmt::Display for LeadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flight duration bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TravelType {
    #[serde(rename = "Short_Haul")]
    ShortHaul,
    #[serde(rename = "Medium_Haul")]
    MediumHaul,
    #[serde(rename = "Long_Haul")]
    LongHaul,
}

impl TravelType {
    /// Bucket a duration in hours: `<= 3` short, `<= 8` medium, above that long
    pub fn from_duration(hours: f64) -> Self {
        if hours <= 3.0 {
            Self::ShortHaul
        } else if hours <= 8.0 {
            Self::MediumHaul
        } else {
            Self::LongHaul
        }
    }

    /// Bucket name as exported
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortHaul => "Short_Haul",
            Self::MediumHaul => "Medium_Haul",
            Self::LongHaul => "Long_Haul",
        }
    }
}

impl fmt::Display for TravelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of paid extras requested: baggage + seat + meal
pub fn extras_count(record: &BookingRecord) -> u8 {
    record.wants_extra_baggage as u8
        + record.wants_preferred_seat as u8
        + record.wants_in_flight_meals as u8
}

/// Departure hour in [`PEAK_HOURS`]
pub fn is_peak_hour(hour: u32) -> bool {
    PEAK_HOURS.contains(&hour)
}

/// Flight day in [`WEEKEND_DAYS`]
pub fn is_weekend(day: &str) -> bool {
    WEEKEND_DAYS.contains(&day)
}

/// Maps categorical values to ids in sorted order of the distinct values seen at fit time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the sorted distinct values
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Id of a value seen at fit time
    pub fn encode(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    /// Value behind an id
    pub fn decode(&self, id: usize) -> Option<&str> {
        self.classes.get(id).map(String::as_str)
    }

    /// Known values in id order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Fitted encoders for every categorical field of a booking
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalEncoders {
    pub sales_channel: LabelEncoder,
    pub trip_type: LabelEncoder,
    pub flight_day: LabelEncoder,
    pub route: LabelEncoder,
    pub booking_origin: LabelEncoder,
    pub booking_lead_category: LabelEncoder,
    pub travel_type: LabelEncoder,
}

impl CategoricalEncoders {
    /// Fit every categorical encoder on the same records
    pub fn fit(records: &[BookingRecord]) -> Self {
        let lead: Vec<LeadCategory> = records
            .iter()
            .map(|r| LeadCategory::from_lead_days(r.purchase_lead))
            .collect();
        let travel: Vec<TravelType> = records
            .iter()
            .map(|r| TravelType::from_duration(r.flight_duration))
            .collect();

        Self {
            sales_channel: LabelEncoder::fit(records.iter().map(|r| r.sales_channel.as_str())),
            trip_type: LabelEncoder::fit(records.iter().map(|r| r.trip_type.as_str())),
            flight_day: LabelEncoder::fit(records.iter().map(|r| r.flight_day.as_str())),
            route: LabelEncoder::fit(records.iter().map(|r| r.route.as_str())),
            booking_origin: LabelEncoder::fit(records.iter().map(|r| r.booking_origin.as_str())),
            booking_lead_category: LabelEncoder::fit(lead.iter().map(LeadCategory::as_str)),
            travel_type: LabelEncoder::fit(travel.iter().map(TravelType::as_str)),
        }
    }

    /// Unscaled feature vector in [`FEATURE_COLUMNS`] order
    pub fn raw_row(&self, record: &BookingRecord) -> Result<[f64; 11]> {
        let lead = LeadCategory::from_lead_days(record.purchase_lead);
        let travel = TravelType::from_duration(record.flight_duration);

        Ok([
            record.num_passengers as f64,
            record.purchase_lead as f64,
            record.length_of_stay as f64,
            record.flight_duration,
            extras_count(record) as f64,
            encode_field(&self.sales_channel, "sales_channel", &record.sales_channel)?,
            encode_field(&self.trip_type, "trip_type", &record.trip_type)?,
            encode_field(&self.booking_lead_category, "booking_lead_category", lead.as_str())?,
            encode_field(&self.travel_type, "travel_type", travel.as_str())?,
            is_peak_hour(record.flight_hour) as u8 as f64,
            is_weekend(&record.flight_day) as u8 as f64,
        ])
    }

    /// Unscaled matrix for a batch of bookings
    pub fn raw_matrix(&self, records: &[BookingRecord]) -> Result<Array2<f64>> {
        let mut data = Vec::with_capacity(records.len() * FEATURE_COLUMNS.len());
        for record in records {
            data.extend_from_slice(&self.raw_row(record)?);
        }
        Array2::from_shape_vec((records.len(), FEATURE_COLUMNS.len()), data)
            .map_err(|e| Error::invalid_parameter(e.to_string()))
    }
}

fn encode_field(encoder: &LabelEncoder, field: &str, value: &str) -> Result<f64> {
    encoder
        .encode(value)
        .map(|id| id as f64)
        .ok_or_else(|| Error::UnknownCategory {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// How to treat a feature column whose standard deviation is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Fail with [`Error::ZeroVariance`]
    #[default]
    Reject,
    /// Subtract the mean and keep a unit scale, leaving the column at zero
    Center,
}

/// Per-column mean and population standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Array1<f64>,
    pub scales: Array1<f64>,
}

impl StandardScaler {
    /// Fit on the columns of `data`; `names` labels columns for error reporting
    pub fn fit(data: &Array2<f64>, names: &[&str], policy: ZeroVariancePolicy) -> Result<Self> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyData);
        }

        let means = data
            .mean_axis(Axis(0))
            .ok_or(Error::EmptyData)?;
        let mut scales = data.std_axis(Axis(0), 0.0);

        for (j, scale) in scales.iter_mut().enumerate() {
            if *scale == 0.0 || !scale.is_finite() {
                match policy {
                    ZeroVariancePolicy::Reject => {
                        return Err(Error::ZeroVariance {
                            column: names.get(j).map_or_else(|| format!("column {j}"), |s| s.to_string()),
                        });
                    }
                    ZeroVariancePolicy::Center => *scale = 1.0,
                }
            }
        }

        Ok(Self { means, scales })
    }

    /// Standardize every row
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.means) / &self.scales
    }

    /// Standardize one row
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &self.means) / &self.scales
    }
}

/// Everything needed to turn further bookings into standardized feature vectors
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTransform {
    pub encoders: CategoricalEncoders,
    pub scaler: StandardScaler,
}

impl FeatureTransform {
    /// Standardize bookings with the fitted encoders and scaling parameters
    pub fn transform(&self, records: &[BookingRecord]) -> Result<Array2<f64>> {
        Ok(self.scaler.transform(&self.encoders.raw_matrix(records)?))
    }
}

/// Standardized feature matrix and the parameters that produced it
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    /// Standardized features (n_records, 11)
    pub matrix: Array2<f64>,
    /// Values before standardization
    pub raw: Array2<f64>,
    pub feature_names: Vec<String>,
    pub transform: FeatureTransform,
}

/// Turns booking records into the clustering feature matrix
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturePreparer {
    zero_variance: ZeroVariancePolicy,
}

impl FeaturePreparer {
    /// Preparer applying `zero_variance` to constant columns
    pub fn new(zero_variance: ZeroVariancePolicy) -> Self {
        Self { zero_variance }
    }

    /// Fit encoders and scaler on `records` and return their standardized matrix
    pub fn prepare(&self, records: &[BookingRecord]) -> Result<PreparedFeatures> {
        if records.is_empty() {
            return Err(Error::EmptyData);
        }

        let encoders = CategoricalEncoders::fit(records);
        let raw = encoders.raw_matrix(records)?;
        let scaler = StandardScaler::fit(&raw, &FEATURE_COLUMNS, self.zero_variance)?;
        let matrix = scaler.transform(&raw);

        info!(
            records = records.len(),
            features = FEATURE_COLUMNS.len(),
            "prepared clustering features"
        );

        Ok(PreparedFeatures {
            matrix,
            raw,
            feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            transform: FeatureTransform { encoders, scaler },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(passengers: u32, lead: u32, duration: f64, channel: &str, day: &str, hour: u32) -> BookingRecord {
        BookingRecord {
            num_passengers: passengers,
            purchase_lead: lead,
            flight_duration: duration,
            sales_channel: channel.to_string(),
            flight_day: day.to_string(),
            flight_hour: hour,
            length_of_stay: lead / 4 + 1,
            trip_type: (if passengers > 1 { "RoundTrip" } else { "OneWay" }).to_string(),
            wants_extra_baggage: passengers > 1,
            wants_preferred_seat: lead > 20,
            ..Default::default()
        }
    }

    fn sample_bookings() -> Vec<BookingRecord> {
        vec![
            booking(1, 3, 1.5, "Mobile", "Wed", 13),
            booking(2, 45, 8.5, "Internet", "Sat", 7),
            booking(4, 120, 9.0, "Internet", "Sun", 18),
            booking(1, 12, 4.0, "Mobile", "Tue", 2),
        ]
    }

    #[test]
    fn test_extras_count() {
        let mut record = BookingRecord::default();
        assert_eq!(extras_count(&record), 0);
        record.wants_extra_baggage = true;
        record.wants_in_flight_meals = true;
        assert_eq!(extras_count(&record), 2);
        record.wants_preferred_seat = true;
        assert_eq!(extras_count(&record), 3);
    }

    #[test]
    fn test_lead_category_boundaries() {
        assert_eq!(LeadCategory::from_lead_days(0), LeadCategory::LastMinute);
        assert_eq!(LeadCategory::from_lead_days(7), LeadCategory::LastMinute);
        assert_eq!(LeadCategory::from_lead_days(8), LeadCategory::Moderate);
        assert_eq!(LeadCategory::from_lead_days(30), LeadCategory::Moderate);
        assert_eq!(LeadCategory::from_lead_days(31), LeadCategory::EarlyPlanner);
        assert_eq!(LeadCategory::from_lead_days(u32::MAX), LeadCategory::EarlyPlanner);
    }

    #[test]
    fn test_travel_type_boundaries() {
        assert_eq!(TravelType::from_duration(3.0), TravelType::ShortHaul);
        assert_eq!(TravelType::from_duration(3.01), TravelType::MediumHaul);
        assert_eq!(TravelType::from_duration(8.0), TravelType::MediumHaul);
        assert_eq!(TravelType::from_duration(8.5), TravelType::LongHaul);
    }

    #[test]
    fn test_peak_and_weekend_flags() {
        for hour in 0..24 {
            let expected = matches!(hour, 6..=8 | 17..=20);
            assert_eq!(is_peak_hour(hour), expected, "hour {}", hour);
        }
        assert!(is_weekend("Sat"));
        assert!(is_weekend("Sun"));
        assert!(!is_weekend("Fri"));
    }

    #[test]
    fn test_label_encoder_sorted_ids() {
        let encoder = LabelEncoder::fit(["Mobile", "Internet", "Mobile"]);
        assert_eq!(encoder.classes(), &["Internet".to_string(), "Mobile".to_string()]);
        assert_eq!(encoder.encode("Internet"), Some(0));
        assert_eq!(encoder.encode("Mobile"), Some(1));
        assert_eq!(encoder.encode("Phone"), None);
        assert_eq!(encoder.decode(1), Some("Mobile"));
    }

    #[test]
    fn test_standardized_columns() {
        let prepared = FeaturePreparer::default().prepare(&sample_bookings()).unwrap();
        assert_eq!(prepared.matrix.dim(), (4, FEATURE_COLUMNS.len()));
        assert_eq!(prepared.feature_names.len(), FEATURE_COLUMNS.len());

        for column in prepared.matrix.columns() {
            let mean = column.mean().unwrap();
            let std = column.std(0.0);
            assert!(mean.abs() < 1e-9, "mean {}", mean);
            assert!((std - 1.0).abs() < 1e-9, "std {}", std);
        }
    }

    #[test]
    fn test_raw_features_follow_derivations() {
        let prepared = FeaturePreparer::default().prepare(&sample_bookings()).unwrap();
        let raw = &prepared.raw;

        // extras_count
        assert_eq!(raw[[0, 4]], 0.0);
        assert_eq!(raw[[2, 4]], 2.0);
        // sales_channel_encoded: Internet=0, Mobile=1
        assert_eq!(raw[[0, 5]], 1.0);
        assert_eq!(raw[[1, 5]], 0.0);
        // is_peak_hour / is_weekend
        assert_eq!(raw[[1, 9]], 1.0);
        assert_eq!(raw[[3, 9]], 0.0);
        assert_eq!(raw[[2, 10]], 1.0);
        assert_eq!(raw[[0, 10]], 0.0);
    }

    #[test]
    fn test_zero_variance_policy() {
        let mut records = sample_bookings();
        for record in &mut records {
            record.trip_type = "RoundTrip".to_string();
        }

        match FeaturePreparer::new(ZeroVariancePolicy::Reject).prepare(&records) {
            Err(Error::ZeroVariance { column }) => assert_eq!(column, "trip_type_encoded"),
            other => panic!("expected ZeroVariance, got {:?}", other),
        }

        let prepared = FeaturePreparer::new(ZeroVariancePolicy::Center)
            .prepare(&records)
            .unwrap();
        assert!(prepared.matrix.column(6).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_records() {
        assert!(matches!(
            FeaturePreparer::default().prepare(&[]),
            Err(Error::EmptyData)
        ));
    }

    #[test]
    fn test_transform_reuses_fitted_parameters() {
        let records = sample_bookings();
        let prepared = FeaturePreparer::default().prepare(&records).unwrap();

        let again = prepared.transform.transform(&records).unwrap();
        assert_eq!(again, prepared.matrix);

        let mut unseen = records[0].clone();
        unseen.sales_channel = "Agency".to_string();
        match prepared.transform.transform(&[unseen]) {
            Err(Error::UnknownCategory { field, value }) => {
                assert_eq!(field, "sales_channel");
                assert_eq!(value, "Agency");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }
}
