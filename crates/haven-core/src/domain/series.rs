use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AssetId, ValidationError, YearMonth};

/// One chartable observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: YearMonth,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: YearMonth, value: f64) -> Result<Self, ValidationError> {
        validate_positive("value", value)?;
        Ok(Self { date, value })
    }
}

/// Monthly series for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub asset: AssetId,
    pub points: Vec<SeriesPoint>,
}

impl AssetSeries {
    pub fn new(asset: AssetId, points: Vec<SeriesPoint>) -> Result<Self, ValidationError> {
        let series = Self { asset, points };
        series.validate_ordering()?;
        Ok(series)
    }

    /// Dates must be non-decreasing; checked before anything is displayed.
    pub fn validate_ordering(&self) -> Result<(), ValidationError> {
        for pair in self.points.windows(2) {
            if pair[1].date < pair[0].date {
                return Err(ValidationError::UnorderedSeries {
                    previous: pair[0].date.format(),
                    current: pair[1].date.format(),
                });
            }
        }
        Ok(())
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Percentage change from the first to the last point.
    pub fn growth_percent(&self) -> Option<f64> {
        let start = self.first()?.value;
        let end = self.last()?.value;
        if start <= 0.0 {
            return None;
        }
        Some((end - start) / start * 100.0)
    }
}

/// One month of a multi-asset comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub date: YearMonth,
    #[serde(flatten)]
    pub values: BTreeMap<AssetId, f64>,
}

/// Citation returned by a grounded query. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub uri: String,
}

/// Whether a series came from the generation service or from the internal baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Real,
    Simulated,
}

impl DataOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Simulated => "simulated",
        }
    }

    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Simulated)
    }
}

impl Display for DataOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display scale applied after interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Absolute,
    /// Rebased so the first point of each asset equals 100.
    Percent,
}

pub(crate) fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}
