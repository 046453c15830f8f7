//! Hand-calibrated per-asset constants and the plausibility gate.
//!
//! The defaults below are provisional: nothing refreshes them as markets
//! move, so deployments should override them from a YAML file (see
//! [`CalibrationTable::load`]) when they drift.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchors::AnchorSet;
use crate::{AssetId, CoreError, ValidationError};

/// Plausibility band and synthetic endpoints for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetCalibration {
    /// Lowest believable current value.
    pub min: f64,
    /// Highest believable current value.
    pub max: f64,
    /// Synthetic series value at the start of the window.
    pub synthetic_start: f64,
    /// Synthetic series value at the end of the window.
    pub synthetic_end: f64,
}

impl AssetCalibration {
    pub const fn new(min: f64, max: f64, synthetic_start: f64, synthetic_end: f64) -> Self {
        Self {
            min,
            max,
            synthetic_start,
            synthetic_end,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && self.min <= value && value <= self.max
    }

    fn validate(&self, asset: AssetId) -> Result<(), ValidationError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min >= self.max {
            return Err(ValidationError::InvalidBand {
                asset: asset.as_str().to_owned(),
                min: self.min,
                max: self.max,
            });
        }
        crate::domain::validate_positive("synthetic_start", self.synthetic_start)?;
        crate::domain::validate_positive("synthetic_end", self.synthetic_end)?;
        Ok(())
    }
}

fn default_asset(asset: AssetId) -> AssetCalibration {
    match asset {
        AssetId::Sp500 => AssetCalibration::new(2_500.0, 9_000.0, 3_700.0, 6_600.0),
        AssetId::Nasdaq => AssetCalibration::new(8_000.0, 32_000.0, 12_500.0, 24_500.0),
        AssetId::Gold => AssetCalibration::new(1_500.0, 6_000.0, 1_850.0, 4_200.0),
        AssetId::Bitcoin => AssetCalibration::new(10_000.0, 250_000.0, 33_000.0, 110_000.0),
    }
}

/// Every tunable constant of validation and series generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub assets: BTreeMap<AssetId, AssetCalibration>,
    /// Exponent `k` of the synthetic growth curve `start + (end - start) * p^k`.
    pub growth_exponent: f64,
    /// Sinusoidal amplitude as a fraction of the synthetic end value.
    pub wave_amplitude: f64,
    /// Random amplitude as a fraction of the synthetic end value.
    pub noise_amplitude: f64,
    /// Random amplitude for interpolated months, as a fraction of the interpolated value.
    pub interpolation_noise: f64,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self {
            assets: AssetId::ALL
                .into_iter()
                .map(|asset| (asset, default_asset(asset)))
                .collect(),
            growth_exponent: 1.6,
            wave_amplitude: 0.03,
            noise_amplitude: 0.02,
            interpolation_noise: 0.02,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CalibrationOverrides {
    #[serde(default)]
    assets: BTreeMap<AssetId, AssetCalibration>,
    growth_exponent: Option<f64>,
    wave_amplitude: Option<f64>,
    noise_amplitude: Option<f64>,
    interpolation_noise: Option<f64>,
}

impl CalibrationTable {
    /// Parse YAML overrides on top of the defaults. Omitted keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let overrides: CalibrationOverrides = if yaml.trim().is_empty() {
            CalibrationOverrides::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        let mut table = Self::default();
        table.assets.extend(overrides.assets);
        if let Some(value) = overrides.growth_exponent {
            table.growth_exponent = value;
        }
        if let Some(value) = overrides.wave_amplitude {
            table.wave_amplitude = value;
        }
        if let Some(value) = overrides.noise_amplitude {
            table.noise_amplitude = value;
        }
        if let Some(value) = overrides.interpolation_noise {
            table.interpolation_noise = value;
        }

        table.validate()?;
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (asset, calibration) in &self.assets {
            calibration.validate(*asset)?;
        }
        if !self.growth_exponent.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "growth_exponent",
            });
        }
        if self.growth_exponent <= 1.0 {
            return Err(ValidationError::SubLinearGrowth {
                value: self.growth_exponent,
            });
        }
        for (field, fraction) in [
            ("wave_amplitude", self.wave_amplitude),
            ("noise_amplitude", self.noise_amplitude),
            ("interpolation_noise", self.interpolation_noise),
        ] {
            if !fraction.is_finite() {
                return Err(ValidationError::NonFiniteValue { field });
            }
            if fraction < 0.0 {
                return Err(ValidationError::NonPositiveValue { field });
            }
        }
        Ok(())
    }

    pub fn asset(&self, asset: AssetId) -> AssetCalibration {
        self.assets
            .get(&asset)
            .copied()
            .unwrap_or_else(|| default_asset(asset))
    }
}

/// Why an anchor set was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlausibilityError {
    #[error("{asset}: only {found} usable anchor point(s), need at least 2")]
    TooFewPoints { asset: AssetId, found: usize },
    #[error("{asset}: latest value {value} is outside plausible range [{min}, {max}]")]
    OutOfBand {
        asset: AssetId,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Accept `set` only if every requested asset has at least two anchors and
/// its most recent anchor lies inside the asset's band.
pub fn validate_anchor_set(
    set: &AnchorSet,
    assets: &[AssetId],
    table: &CalibrationTable,
) -> Result<(), PlausibilityError> {
    for asset in assets {
        let series = set.series_for(*asset);
        if series.len() < 2 {
            return Err(PlausibilityError::TooFewPoints {
                asset: *asset,
                found: series.len(),
            });
        }

        let band = table.asset(*asset);
        let latest = series.last().map(|(_, value)| *value).unwrap_or_default();
        if !band.contains(latest) {
            return Err(PlausibilityError::OutOfBand {
                asset: *asset,
                value: latest,
                min: band.min,
                max: band.max,
            });
        }
    }
    Ok(())
}
