//! Sparse anchor observations returned by the generation service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{match_asset_key, parse_loose_number};
use crate::{AssetId, DateWindow, SourceCitation, ValidationError, YearMonth};

const DATE_KEYS: [&str; 4] = ["date", "month", "period", "time"];

/// What the caller wants anchors for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorQuery {
    pub assets: Vec<AssetId>,
    pub window: DateWindow,
    /// Free-text description of the asset; defaults to [`AssetId::query`].
    pub description: Option<String>,
}

impl AnchorQuery {
    pub fn new(assets: Vec<AssetId>, window: DateWindow) -> Result<Self, ValidationError> {
        if assets.is_empty() {
            return Err(ValidationError::EmptyAssetList);
        }
        let mut assets = assets;
        assets.sort();
        assets.dedup();
        Ok(Self {
            assets,
            window,
            description: None,
        })
    }

    pub fn single(asset: AssetId, window: DateWindow) -> Self {
        Self {
            assets: vec![asset],
            window,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    pub fn is_single(&self) -> bool {
        self.assets.len() == 1
    }

    /// Text describing what is being priced, used inside prompts.
    pub fn subject(&self) -> String {
        match (&self.description, self.assets.as_slice()) {
            (Some(description), _) => description.clone(),
            (None, [asset]) => asset.query().to_owned(),
            (None, assets) => assets
                .iter()
                .map(|asset| format!("{} (key \"{}\")", asset.label(), asset.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// One dated observation; assets the response did not mention are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRow {
    pub month: YearMonth,
    pub values: BTreeMap<AssetId, Option<f64>>,
}

/// Anchor rows sorted by month, plus any citations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnchorSet {
    pub rows: Vec<AnchorRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceCitation>,
}

impl AnchorSet {
    pub fn new(mut rows: Vec<AnchorRow>) -> Self {
        rows.sort_by_key(|row| row.month);
        Self {
            rows,
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    /// Non-null, positive anchors for `asset`, ascending, first observation per month.
    pub fn series_for(&self, asset: AssetId) -> Vec<(YearMonth, f64)> {
        let mut output: Vec<(YearMonth, f64)> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let Some(Some(value)) = row.values.get(&asset) else {
                continue;
            };
            if !value.is_finite() || *value <= 0.0 {
                continue;
            }
            if output.last().is_some_and(|(month, _)| *month == row.month) {
                continue;
            }
            output.push((row.month, *value));
        }
        output
    }

    pub fn usable_points(&self, asset: AssetId) -> usize {
        self.series_for(asset).len()
    }
}

/// Convert extracted JSON objects into anchors for `assets`.
///
/// Rows without a parseable date are skipped. For a single-asset request a
/// plain `value` key is accepted before falling back to key matching.
pub fn anchors_from_json(rows: &[Value], assets: &[AssetId]) -> AnchorSet {
    let single = assets.len() == 1;
    let mut output = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(object) = row.as_object() else {
            continue;
        };
        let Some(month) = DATE_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .and_then(Value::as_str)
            .and_then(|raw| YearMonth::parse(raw).ok())
        else {
            continue;
        };

        let keys = || {
            object
                .keys()
                .map(String::as_str)
                .filter(|key| !DATE_KEYS.contains(key))
        };

        let mut values = BTreeMap::new();
        for asset in assets {
            let key = if single && object.contains_key("value") {
                Some("value")
            } else {
                match_asset_key(*asset, keys())
            };
            let value = key
                .and_then(|key| object.get(key))
                .and_then(parse_loose_number);
            values.insert(*asset, value);
        }
        output.push(AnchorRow { month, values });
    }

    AnchorSet::new(output)
}
