//! Booking record model and CSV ingestion using Polars

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// Columns every booking file must provide
pub const REQUIRED_COLUMNS: [&str; 14] = [
    "num_passengers",
    "sales_channel",
    "trip_type",
    "purchase_lead",
    "length_of_stay",
    "flight_hour",
    "flight_day",
    "route",
    "booking_origin",
    "wants_extra_baggage",
    "wants_preferred_seat",
    "wants_in_flight_meals",
    "flight_duration",
    "booking_complete",
];

/// One customer booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub num_passengers: u32,
    pub sales_channel: String,
    pub trip_type: String,
    /// Days between purchase and departure
    pub purchase_lead: u32,
    /// Days at the destination
    pub length_of_stay: u32,
    /// Departure hour, 0-23
    pub flight_hour: u32,
    /// Three-letter day name, e.g. `Sat`
    pub flight_day: String,
    pub route: String,
    pub booking_origin: String,
    pub wants_extra_baggage: bool,
    pub wants_preferred_seat: bool,
    pub wants_in_flight_meals: bool,
    /// Flight duration in hours
    pub flight_duration: f64,
    pub booking_complete: bool,
}

impl Default for BookingRecord {
    fn default() -> Self {
        Self {
            num_passengers: 1,
            sales_channel: "Internet".to_string(),
            trip_type: "RoundTrip".to_string(),
            purchase_lead: 30,
            length_of_stay: 7,
            flight_hour: 12,
            flight_day: "Mon".to_string(),
            route: "AKLDEL".to_string(),
            booking_origin: "New Zealand".to_string(),
            wants_extra_baggage: false,
            wants_preferred_seat: false,
            wants_in_flight_meals: false,
            flight_duration: 5.0,
            booking_complete: true,
        }
    }
}

/// Load a booking CSV and convert every row into a [`BookingRecord`]
///
/// # Arguments
/// * `file_path` - Path to the CSV file
///
/// # Returns
/// * Records in file order; a record's position is its identity downstream
pub fn load_bookings(file_path: impl AsRef<Path>) -> Result<Vec<BookingRecord>> {
    let file_path = file_path.as_ref();
    // infer dtypes from every row, not a prefix
    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()?
        .collect()?;

    let records = records_from_frame(&df)?;
    info!(
        path = %file_path.display(),
        rows = records.len(),
        columns = df.width(),
        "booking data loaded"
    );
    Ok(records)
}

/// Validate the required columns of a frame and convert its rows
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<BookingRecord>> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns { columns: missing });
    }

    let num_passengers = count_column(df, "num_passengers")?;
    let sales_channel = text_column(df, "sales_channel")?;
    let trip_type = text_column(df, "trip_type")?;
    let purchase_lead = count_column(df, "purchase_lead")?;
    let length_of_stay = count_column(df, "length_of_stay")?;
    let flight_hour = count_column(df, "flight_hour")?;
    let flight_day = text_column(df, "flight_day")?;
    let route = text_column(df, "route")?;
    let booking_origin = text_column(df, "booking_origin")?;
    let wants_extra_baggage = flag_column(df, "wants_extra_baggage")?;
    let wants_preferred_seat = flag_column(df, "wants_preferred_seat")?;
    let wants_in_flight_meals = flag_column(df, "wants_in_flight_meals")?;
    let flight_duration = real_column(df, "flight_duration")?;
    let booking_complete = flag_column(df, "booking_complete")?;

    for (row, &hour) in flight_hour.iter().enumerate() {
        if hour > 23 {
            return Err(Error::invalid_value(
                "flight_hour",
                row,
                format!("hour {hour} is outside 0-23"),
            ));
        }
    }

    let records = (0..df.height())
        .map(|i| BookingRecord {
            num_passengers: num_passengers[i],
            sales_channel: sales_channel[i].clone(),
            trip_type: trip_type[i].clone(),
            purchase_lead: purchase_lead[i],
            length_of_stay: length_of_stay[i],
            flight_hour: flight_hour[i],
            flight_day: flight_day[i].clone(),
            route: route[i].clone(),
            booking_origin: booking_origin[i].clone(),
            wants_extra_baggage: wants_extra_baggage[i],
            wants_preferred_seat: wants_preferred_seat[i],
            wants_in_flight_meals: wants_in_flight_meals[i],
            flight_duration: flight_duration[i],
            booking_complete: booking_complete[i],
        })
        .collect();

    Ok(records)
}

fn real_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(Error::invalid_value(name, row, format!("{v} is not finite"))),
            None => Err(Error::MissingValue {
                column: name.to_string(),
                row,
            }),
        })
        .collect()
}

/// Non-negative whole numbers such as passenger counts and day spans
fn count_column(df: &DataFrame, name: &str) -> Result<Vec<u32>> {
    real_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64 {
                Err(Error::invalid_value(
                    name,
                    row,
                    format!("expected a non-negative integer, got {v}"),
                ))
            } else {
                Ok(v as u32)
            }
        })
        .collect()
}

/// 0/1 or true/false columns
fn flag_column(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    real_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(Error::invalid_value(name, row, format!("expected 0 or 1, got {v}")))
            }
        })
        .collect()
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series.str()?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(|s| s.trim().to_string())
                .ok_or_else(|| Error::MissingValue {
                    column: name.to_string(),
                    row,
                })
        })
        .collect()
}
