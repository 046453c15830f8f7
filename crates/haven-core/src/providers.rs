//! Anchor provider contract and the two generation-backed stages.
//!
//! | Stage | Provider | Request shape |
//! |-------|----------|---------------|
//! | `grounded` | [`GroundedAnchorProvider`] | search tool on, JSON embedded in prose |
//! | `structured` | [`StructuredAnchorProvider`] | response schema forced, no search |
//! | `synthetic` | none | generated locally by the normalizer |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::anchors::{anchors_from_json, AnchorQuery, AnchorSet};
use crate::calibration::PlausibilityError;
use crate::extract::{extract_json_array, ExtractError};
use crate::genai::{GenError, GenerationRequest, TextGenerator};
use crate::YearMonth;

/// Windows at most this long are requested month by month.
const DENSE_WINDOW_MONTHS: usize = 24;

/// Checkpoint offsets, in months before the window end.
const CHECKPOINT_OFFSETS: [i64; 5] = [60, 36, 12, 6, 0];

/// Pipeline stage identifier used in stage chains and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Grounded,
    Structured,
    Synthetic,
}

impl StageId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grounded => "grounded",
            Self::Structured => "structured",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for StageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    Generation,
    Malformed,
    Implausible,
    Unavailable,
}

/// Why a stage produced no usable anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    kind: StageErrorKind,
    message: String,
}

impl StageError {
    pub fn generation(error: &GenError) -> Self {
        Self {
            kind: StageErrorKind::Generation,
            message: format!("{error} [{}]", error.code()),
        }
    }

    pub fn malformed(error: &ExtractError) -> Self {
        Self {
            kind: StageErrorKind::Malformed,
            message: error.to_string(),
        }
    }

    pub fn implausible(error: &PlausibilityError) -> Self {
        Self {
            kind: StageErrorKind::Implausible,
            message: error.to_string(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Unavailable,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> StageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            StageErrorKind::Generation => "stage.generation_failed",
            StageErrorKind::Malformed => "stage.malformed_response",
            StageErrorKind::Implausible => "stage.implausible_data",
            StageErrorKind::Unavailable => "stage.unavailable",
        }
    }
}

impl Display for StageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for StageError {}

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<AnchorSet, StageError>> + Send + 'a>>;

/// One way of obtaining anchors.
pub trait AnchorProvider: Send + Sync {
    fn stage(&self) -> StageId;

    fn try_fetch<'a>(&'a self, query: &'a AnchorQuery) -> StageFuture<'a>;
}

/// Primary stage: search-grounded request with JSON embedded in the answer.
#[derive(Clone)]
pub struct GroundedAnchorProvider {
    generator: Arc<dyn TextGenerator>,
}

impl GroundedAnchorProvider {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn fetch(&self, query: &AnchorQuery) -> Result<AnchorSet, StageError> {
        let request = GenerationRequest::new(grounded_prompt(query)).grounded();
        let response = self
            .generator
            .generate(request)
            .await
            .map_err(|e| StageError::generation(&e))?;

        let rows = extract_json_array(&response.text).map_err(|e| StageError::malformed(&e))?;
        debug!(rows = rows.len(), sources = response.sources.len(), "grounded anchors extracted");
        Ok(anchors_from_json(&rows, &query.assets).with_sources(response.sources))
    }
}

impl AnchorProvider for GroundedAnchorProvider {
    fn stage(&self) -> StageId {
        StageId::Grounded
    }

    fn try_fetch<'a>(&'a self, query: &'a AnchorQuery) -> StageFuture<'a> {
        Box::pin(self.fetch(query))
    }
}

/// Degraded stage: ungrounded request with a strict response schema.
#[derive(Clone)]
pub struct StructuredAnchorProvider {
    generator: Arc<dyn TextGenerator>,
}

impl StructuredAnchorProvider {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn fetch(&self, query: &AnchorQuery) -> Result<AnchorSet, StageError> {
        let request = GenerationRequest::new(structured_prompt(query))
            .with_response_schema(anchor_schema(query));
        let response = self
            .generator
            .generate(request)
            .await
            .map_err(|e| StageError::generation(&e))?;

        let rows = extract_json_array(&response.text).map_err(|e| StageError::malformed(&e))?;
        debug!(rows = rows.len(), "structured anchors extracted");
        Ok(anchors_from_json(&rows, &query.assets))
    }
}

impl AnchorProvider for StructuredAnchorProvider {
    fn stage(&self) -> StageId {
        StageId::Structured
    }

    fn try_fetch<'a>(&'a self, query: &'a AnchorQuery) -> StageFuture<'a> {
        Box::pin(self.fetch(query))
    }
}

/// Months the service is asked to report. Short windows are requested in
/// full; long ones at fixed look-back checkpoints inside the window.
pub fn checkpoint_months(query: &AnchorQuery) -> Vec<YearMonth> {
    let window = query.window;
    if window.len_months() <= DENSE_WINDOW_MONTHS {
        return window.months();
    }

    let mut months: Vec<YearMonth> = std::iter::once(window.start)
        .chain(
            CHECKPOINT_OFFSETS
                .iter()
                .map(|offset| window.end.add_months(-offset)),
        )
        .filter(|month| window.contains(*month))
        .collect();
    months.sort();
    months.dedup();
    months
}

fn example_row(query: &AnchorQuery) -> String {
    if query.is_single() {
        return String::from(r#"{"date": "YYYY-MM", "value": 123.45}"#);
    }
    let fields: Vec<String> = query
        .assets
        .iter()
        .map(|asset| format!("\"{}\": 123.45", asset.as_str()))
        .collect();
    format!("{{\"date\": \"YYYY-MM\", {}}}", fields.join(", "))
}

fn month_list(query: &AnchorQuery) -> String {
    checkpoint_months(query)
        .into_iter()
        .map(YearMonth::format)
        .collect::<Vec<_>>()
        .join(", ")
}

fn grounded_prompt(query: &AnchorQuery) -> String {
    format!(
        "The current month is {end}. Use web search to find the monthly closing price of {subject} \
         for each of these months: {months}. Report absolute prices in USD, not percentages. \
         Include in your reply a JSON array of objects shaped like [{row}], one object per month, \
         ordered from oldest to newest.",
        end = query.window.end,
        subject = query.subject(),
        months = month_list(query),
        row = example_row(query),
    )
}

fn structured_prompt(query: &AnchorQuery) -> String {
    format!(
        "List the monthly closing price in USD of {subject} for each of these months: {months}. \
         Return one object per month, ordered from oldest to newest, using absolute prices.",
        subject = query.subject(),
        months = month_list(query),
    )
}

/// Array-of-objects schema; `date` and every numeric field are required.
pub fn anchor_schema(query: &AnchorQuery) -> Value {
    let mut properties = Map::new();
    properties.insert(String::from("date"), json!({ "type": "STRING" }));
    let mut required = vec![json!("date")];

    if query.is_single() {
        properties.insert(String::from("value"), json!({ "type": "NUMBER" }));
        required.push(json!("value"));
    } else {
        for asset in &query.assets {
            properties.insert(asset.as_str().to_owned(), json!({ "type": "NUMBER" }));
            required.push(json!(asset.as_str()));
        }
    }

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": Value::Object(properties),
            "required": required,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetId, DateWindow};

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(
            YearMonth::parse(start).expect("start"),
            YearMonth::parse(end).expect("end"),
        )
        .expect("window")
    }

    #[test]
    fn long_windows_use_look_back_checkpoints() {
        let query = AnchorQuery::single(AssetId::Gold, window("2021-10", "2026-10"));
        let months: Vec<String> = checkpoint_months(&query).into_iter().map(YearMonth::format).collect();

        assert_eq!(months, vec!["2021-10", "2023-10", "2025-10", "2026-04", "2026-10"]);
    }

    #[test]
    fn short_windows_request_every_month() {
        let query = AnchorQuery::single(AssetId::Gold, window("2026-01", "2026-06"));
        assert_eq!(checkpoint_months(&query).len(), 6);
    }

    #[test]
    fn multi_asset_schema_requires_each_identifier() {
        let query = AnchorQuery::new(vec![AssetId::Sp500, AssetId::Gold], window("2025-10", "2026-10"))
            .expect("query");
        let schema = anchor_schema(&query);

        assert_eq!(schema["items"]["required"], json!(["date", "sp500", "gold"]));
        assert_eq!(schema["items"]["properties"]["gold"]["type"], "NUMBER");
    }

    #[test]
    fn single_asset_schema_uses_value_field() {
        let query = AnchorQuery::single(AssetId::Bitcoin, window("2025-10", "2026-10"));
        assert_eq!(anchor_schema(&query)["items"]["required"], json!(["date", "value"]));
    }

    #[test]
    fn stage_error_codes_are_stable() {
        assert_eq!(StageError::unavailable("x").code(), "stage.unavailable");
        assert_eq!(
            StageError::malformed(&ExtractError::NoArray).kind(),
            StageErrorKind::Malformed
        );
    }
}
