use serde::Serialize;

use haven_core::AssetId;

use crate::error::CliError;

use super::{AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct AssetEntry {
    id: AssetId,
    label: &'static str,
    color: &'static str,
    query: &'static str,
    aliases: &'static [&'static str],
    plausible_min: f64,
    plausible_max: f64,
}

#[derive(Debug, Serialize)]
struct AssetsResponseData {
    assets: Vec<AssetEntry>,
    stages: Vec<&'static str>,
}

pub fn run(context: &AppContext) -> Result<CommandResult, CliError> {
    let calibration = context.normalizer.calibration();
    let assets = AssetId::ALL
        .into_iter()
        .map(|asset| {
            let band = calibration.asset(asset);
            AssetEntry {
                id: asset,
                label: asset.label(),
                color: asset.color(),
                query: asset.query(),
                aliases: asset.aliases(),
                plausible_min: band.min,
                plausible_max: band.max,
            }
        })
        .collect();
    let stages = context
        .normalizer
        .stages()
        .into_iter()
        .map(|stage| stage.as_str())
        .chain(std::iter::once("synthetic"))
        .collect();

    let data = serde_json::to_value(AssetsResponseData { assets, stages })?;
    Ok(CommandResult::ok(data))
}
