use serde::Serialize;

use haven_core::{
    AssetId, DateWindow, EnvelopeError, FetchOptions, Scale, SeriesPoint, SourceCitation,
    YearMonth,
};

use crate::cli::TrendArgs;
use crate::error::CliError;

use super::{AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct TrendResponseData<'a> {
    asset: AssetId,
    label: &'static str,
    color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    scale: Scale,
    window: DateWindow,
    points: &'a [SeriesPoint],
    growth_percent: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceCitation>,
}

pub async fn run(args: &TrendArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let asset: AssetId = args.asset.parse()?;
    let window = DateWindow::trailing_years(args.years, YearMonth::current())?;

    let mut options = FetchOptions::default();
    if args.refresh {
        options = options.refresh();
    }
    if args.percent {
        options = options.with_scale(Scale::Percent);
    }
    if let Some(description) = &args.query {
        options = options.with_description(description.as_str());
    }

    let outcome = context.normalizer.fetch_trend(asset, window, options).await?;
    let effective_window = match (outcome.series.first(), outcome.series.last()) {
        (Some(first), Some(last)) => DateWindow::new(first.date, last.date)?,
        _ => window,
    };

    let data = serde_json::to_value(TrendResponseData {
        asset,
        label: asset.label(),
        color: asset.color(),
        query: args.query.as_deref(),
        scale: outcome.scale,
        window: effective_window,
        points: &outcome.series.points,
        growth_percent: outcome.series.growth_percent(),
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
