use thiserror::Error;

/// Validation and contract errors exposed by `haven-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid asset '{value}', expected one of sp500, nasdaq, gold, bitcoin")]
    InvalidAsset { value: String },
    #[error("asset list cannot be empty")]
    EmptyAssetList,

    #[error("invalid month '{value}', expected YYYY-MM or YYYY-MM-DD")]
    InvalidMonth { value: String },
    #[error("window start {start} is after window end {end}")]
    InvertedWindow { start: String, end: String },
    #[error("window length must be at least one month")]
    EmptyWindow,

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },

    #[error("series dates must be ascending: '{previous}' precedes '{current}'")]
    UnorderedSeries { previous: String, current: String },

    #[error("calibration for '{asset}' has min {min} >= max {max}")]
    InvalidBand { asset: String, min: f64, max: f64 },
    #[error("growth exponent {value} must be greater than 1 for an accelerating curve")]
    SubLinearGrowth { value: f64 },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("journal level {level} is out of range 0..=4")]
    InvalidJournalLevel { level: u8 },

    #[error("{field} cannot be empty")]
    EmptyText { field: &'static str },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema version '{value}' must look like vMAJOR.MINOR.PATCH")]
    InvalidSchemaVersion { value: String },
    #[error("envelope error code cannot be empty")]
    EmptyErrorCode,
    #[error("envelope error message cannot be empty")]
    EmptyErrorMessage,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("calibration file error: {0}")]
    Calibration(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
