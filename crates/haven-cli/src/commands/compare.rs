use serde::Serialize;

use haven_core::{
    ComparisonRow, DateWindow, EnvelopeError, FetchOptions, Scale, SourceCitation, YearMonth,
};

use crate::cli::CompareArgs;
use crate::error::CliError;

use super::{parse_assets, AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct AssetSummary {
    asset: haven_core::AssetId,
    label: &'static str,
    color: &'static str,
    growth_percent: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CompareResponseData<'a> {
    scale: Scale,
    window: DateWindow,
    assets: Vec<AssetSummary>,
    rows: &'a [ComparisonRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    insight: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceCitation>,
}

pub async fn run(args: &CompareArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let assets = parse_assets(&args.assets)?;
    let window = DateWindow::trailing_months(args.months, YearMonth::current())?;

    let mut options = FetchOptions::default();
    if args.refresh {
        options = options.refresh();
    }
    if args.absolute {
        options = options.with_scale(Scale::Absolute);
    }

    let outcome = context.normalizer.compare(&assets, window, options).await?;
    let summaries = outcome
        .series
        .iter()
        .map(|series| AssetSummary {
            asset: series.asset,
            label: series.asset.label(),
            color: series.asset.color(),
            growth_percent: series.growth_percent(),
        })
        .collect();
    let effective_window = match (outcome.rows.first(), outcome.rows.last()) {
        (Some(first), Some(last)) => DateWindow::new(first.date, last.date)?,
        _ => window,
    };

    let data = serde_json::to_value(CompareResponseData {
        scale: outcome.scale,
        window: effective_window,
        assets: summaries,
        rows: &outcome.rows,
        insight: outcome.insight.as_deref(),
        sources: outcome.sources.clone(),
    })?;

    Ok(CommandResult::ok(data)
        .with_origin(outcome.origin, outcome.status_line())
        .with_stage_chain(outcome.stage_chain)
        .with_cache_hit(outcome.cache_hit)
        .with_latency(outcome.latency_ms)
        .with_warnings(outcome.warnings)
        .with_errors(outcome.errors.into_iter().map(EnvelopeError::from).collect()))
}
