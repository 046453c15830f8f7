//! Monthly series construction: anchor interpolation, the synthetic
//! baseline and percent rebasing.

use std::collections::BTreeMap;

use fastrand::Rng;

use crate::calibration::CalibrationTable;
use crate::{AssetId, AssetSeries, ComparisonRow, DateWindow, SeriesPoint, YearMonth};

/// Period, in months, of the synthetic wave term.
const WAVE_PERIOD_MONTHS: f64 = 5.0;

/// Expand sparse anchors into one point per month.
///
/// Anchor values are emitted verbatim. Months between two anchors are
/// linearly interpolated and perturbed by at most `noise_fraction` of the
/// interpolated value. When segments meet on the same month only the first
/// emission is kept, so the output is strictly ascending by month.
pub fn interpolate_monthly(
    anchors: &[(YearMonth, f64)],
    noise_fraction: f64,
    rng: &mut Rng,
) -> Vec<SeriesPoint> {
    let mut anchors = anchors.to_vec();
    anchors.sort_by_key(|(month, _)| *month);
    anchors.dedup_by_key(|(month, _)| *month);

    let noise_fraction = noise_fraction.clamp(0.0, 0.5);
    let mut output: Vec<SeriesPoint> = Vec::new();
    let emit = |date: YearMonth, value: f64, output: &mut Vec<SeriesPoint>| {
        if output.last().is_some_and(|point| point.date == date) {
            return;
        }
        output.push(SeriesPoint { date, value });
    };

    if let [(month, value)] = anchors.as_slice() {
        emit(*month, *value, &mut output);
        return output;
    }

    for pair in anchors.windows(2) {
        let (start, v0) = pair[0];
        let (end, v1) = pair[1];
        let steps = start.months_until(end);

        for step in 0..=steps {
            let date = start.add_months(step);
            let value = if step == 0 {
                v0
            } else if step == steps {
                v1
            } else {
                let linear = v0 + (v1 - v0) * (step as f64 / steps as f64);
                linear + linear * noise_fraction * symmetric_unit(rng)
            };
            emit(date, value, &mut output);
        }
    }

    output
}

/// Internal baseline used when no trustworthy anchors exist.
///
/// Value at progress `p` through the window is
/// `start + (end - start) * p^k + wave + noise`, where both perturbations
/// scale with the calibrated end value.
pub fn synthetic_series(
    asset: AssetId,
    window: DateWindow,
    table: &CalibrationTable,
    rng: &mut Rng,
) -> AssetSeries {
    let calibration = table.asset(asset);
    let months = window.months();
    let last_index = months.len().saturating_sub(1);
    let floor = calibration.synthetic_start.min(calibration.synthetic_end) * 0.5;

    let points = months
        .into_iter()
        .enumerate()
        .map(|(index, date)| {
            let progress = if last_index == 0 {
                1.0
            } else {
                index as f64 / last_index as f64
            };
            let trend = calibration.synthetic_start
                + (calibration.synthetic_end - calibration.synthetic_start)
                    * progress.powf(table.growth_exponent);
            let wave = calibration.synthetic_end
                * table.wave_amplitude
                * (index as f64 / WAVE_PERIOD_MONTHS).sin();
            let noise =
                calibration.synthetic_end * table.noise_amplitude * symmetric_unit(rng);

            SeriesPoint {
                date,
                value: (trend + wave + noise).max(floor),
            }
        })
        .collect();

    AssetSeries { asset, points }
}

/// Rebase so the first point equals 100.
pub fn rebase_percent(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let Some(base) = points.first().map(|point| point.value).filter(|v| *v > 0.0) else {
        return points.to_vec();
    };
    points
        .iter()
        .map(|point| SeriesPoint {
            date: point.date,
            value: point.value / base * 100.0,
        })
        .collect()
}

/// Merge per-asset series into month rows. Months missing for an asset
/// simply omit that asset's column.
pub fn comparison_rows(series: &[AssetSeries]) -> Vec<ComparisonRow> {
    let mut rows: BTreeMap<YearMonth, BTreeMap<AssetId, f64>> = BTreeMap::new();
    for entry in series {
        for point in &entry.points {
            rows.entry(point.date)
                .or_default()
                .insert(entry.asset, point.value);
        }
    }
    rows.into_iter()
        .map(|(date, values)| ComparisonRow { date, values })
        .collect()
}

fn symmetric_unit(rng: &mut Rng) -> f64 {
    rng.f64() * 2.0 - 1.0
}
