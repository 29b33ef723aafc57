//! Error types for the segmentation pipeline

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Result type alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, preparing, clustering or exporting bookings
#[derive(Error, Debug)]
pub enum Error {
    /// The input is missing one or more required columns
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumns {
        /// Names of the absent columns
        columns: Vec<String>,
    },

    /// A required field is null
    #[error("missing value in column `{column}` at row {row}")]
    MissingValue {
        /// Column name
        column: String,
        /// Zero-based row index
        row: usize,
    },

    /// A field holds a value outside its domain
    #[error("invalid value in column `{column}` at row {row}: {message}")]
    InvalidValue {
        /// Column name
        column: String,
        /// Zero-based row index
        row: usize,
        /// What was wrong
        message: String,
    },

    /// Standardization is undefined for a constant column
    #[error("feature `{column}` has zero variance, cannot standardize")]
    ZeroVariance {
        /// Feature column name
        column: String,
    },

    /// A categorical value was never seen when the encoders were fitted
    #[error("unknown {field} value `{value}`")]
    UnknownCategory {
        /// Categorical field name
        field: String,
        /// Offending value
        value: String,
    },

    /// No records to work with
    #[error("no booking records to process")]
    EmptyData,

    /// Fewer distinct points than requested clusters
    #[error("cannot fit k={k}: only {distinct} distinct points available")]
    InsufficientData {
        /// Requested cluster count
        k: usize,
        /// Number of distinct feature vectors
        distinct: usize,
    },

    /// Invalid configuration or argument
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        /// Error message
        message: String,
    },

    /// Chart rendering failed
    #[error("plotting failed: {message}")]
    Plot {
        /// Backend error text
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new InvalidParameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new InvalidValue error
    pub fn invalid_value(column: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            row,
            message: message.into(),
        }
    }

    /// Whether this error comes from bad input data rather than configuration or I/O
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumns { .. }
                | Self::MissingValue { .. }
                | Self::InvalidValue { .. }
                | Self::ZeroVariance { .. }
                | Self::UnknownCategory { .. }
                | Self::EmptyData
        )
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for Error
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        Self::Plot {
            message: err.to_string(),
        }
    }
}
