use std::time::Instant;

use serde::Serialize;
use time::format_description::well_known::Iso8601;
use time::{Date, OffsetDateTime};

use haven_core::companion::{denoise_headline, future_letter, zen_wisdom};
use haven_core::daily_quote;

use crate::cli::{DenoiseArgs, LetterArgs, QuoteArgs};
use crate::error::CliError;

use super::{AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    date: String,
    quote: &'static str,
}

const FALLBACK_WARNING: &str = "generation unavailable; showing built-in text";

pub async fn denoise(args: &DenoiseArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let result = denoise_headline(context.generator.as_ref(), &args.headline).await?;
    let warnings = fallback_warning(result.fallback);

    Ok(CommandResult::ok(serde_json::to_value(&result)?)
        .with_warnings(warnings)
        .with_latency(elapsed_ms(started)))
}

pub async fn wisdom(context: &AppContext) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let result = zen_wisdom(context.generator.as_ref()).await;
    let warnings = fallback_warning(result.fallback);

    Ok(CommandResult::ok(serde_json::to_value(&result)?)
        .with_warnings(warnings)
        .with_latency(elapsed_ms(started)))
}

pub async fn letter(args: &LetterArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let result = future_letter(context.generator.as_ref(), &args.message).await?;
    let warnings = fallback_warning(result.fallback);

    Ok(CommandResult::ok(serde_json::to_value(&result)?)
        .with_warnings(warnings)
        .with_latency(elapsed_ms(started)))
}

pub fn quote(args: &QuoteArgs) -> Result<CommandResult, CliError> {
    let date = match &args.date {
        Some(raw) => Date::parse(raw.trim(), &Iso8601::DEFAULT)
            .map_err(|error| CliError::Command(format!("invalid --date '{raw}': {error}")))?,
        None => OffsetDateTime::now_utc().date(),
    };

    let data = serde_json::to_value(QuoteResponseData {
        date: date.to_string(),
        quote: daily_quote(date),
    })?;
    Ok(CommandResult::ok(data))
}

fn fallback_warning(fallback: bool) -> Vec<String> {
    if fallback {
        vec![String::from(FALLBACK_WARNING)]
    } else {
        Vec::new()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
