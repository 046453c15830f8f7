use serde::Serialize;

use haven_core::{AssetId, DateWindow, YearMonth};

use crate::cli::{CacheClearArgs, ClearTarget};
use crate::error::CliError;

use super::{parse_assets, AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct CacheClearData {
    key: String,
    removed: bool,
}

pub async fn clear(args: &CacheClearArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let today = YearMonth::current();
    let key = match &args.target {
        ClearTarget::Trend(target) => {
            let asset: AssetId = target.asset.parse()?;
            let window = DateWindow::trailing_years(target.years, today)?;
            context
                .normalizer
                .trend_key(asset, target.query.as_deref(), window)
        }
        ClearTarget::Compare(target) => {
            let assets = parse_assets(&target.assets)?;
            let window = DateWindow::trailing_months(target.months, today)?;
            context.normalizer.comparison_key(&assets, window)
        }
    };

    let removed = context.normalizer.cache().invalidate(&key).await?;
    let data = serde_json::to_value(CacheClearData {
        key: key.to_string(),
        removed,
    })?;
    Ok(CommandResult::ok(data))
}
