//! Recovery of JSON payloads from free-form generated text.
//!
//! Generated answers wrap their data in prose, markdown fences or citation
//! markers such as `[1]`. [`extract_json_array`] finds the array of objects
//! inside that text; [`match_asset_key`] and [`parse_loose_number`] then
//! reconcile whatever keys and number formats the model chose.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::AssetId;

/// Structured extraction failure. Extraction never panics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no JSON array found in response text")]
    NoArray,
    #[error("bracketed text is not a JSON array of objects: {0}")]
    Malformed(String),
}

fn object_array_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[\s*\{[\s\S]*?\}\s*\]").ok())
        .as_ref()
}

/// Pull the first well-formed array of objects out of `text`.
///
/// The widest `[`..`]` span is tried first; when it does not parse (for
/// example because a citation marker follows the payload) every lazily
/// matched `[{ ... }]` sequence is tried in order.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, ExtractError> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(ExtractError::NoArray);
    };

    let mut last_error = None;
    if start < end {
        match parse_object_array(&text[start..=end]) {
            Ok(rows) => return Ok(rows),
            Err(error) => last_error = Some(error),
        }
    }

    let candidates = object_array_pattern()
        .into_iter()
        .flat_map(|pattern| pattern.find_iter(text));
    for candidate in candidates {
        match parse_object_array(candidate.as_str()) {
            Ok(rows) => return Ok(rows),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or(ExtractError::NoArray))
}

fn parse_object_array(candidate: &str) -> Result<Vec<Value>, ExtractError> {
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ExtractError::Malformed(e.to_string()))?;
    let Value::Array(rows) = value else {
        return Err(ExtractError::Malformed(String::from("top-level value is not an array")));
    };
    if rows.iter().any(|row| !row.is_object()) {
        return Err(ExtractError::Malformed(String::from(
            "array elements must be objects",
        )));
    }
    Ok(rows)
}

/// Find the response key that carries `asset`'s value.
///
/// Tried in order: exact identifier, case-insensitive identifier, substring
/// containment either way, then the asset's aliases.
pub fn match_asset_key<'a, I>(asset: AssetId, keys: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<&str> = keys.into_iter().collect();
    let id = asset.as_str();

    if let Some(key) = keys.iter().copied().find(|key| *key == id) {
        return Some(key);
    }
    if let Some(key) = keys.iter().copied().find(|key| key.eq_ignore_ascii_case(id)) {
        return Some(key);
    }

    let lowered: Vec<(&str, String)> = keys
        .iter()
        .map(|key| (*key, key.to_ascii_lowercase()))
        .collect();
    if let Some((key, _)) = lowered
        .iter()
        .find(|(_, lower)| lower.len() >= 3 && (lower.contains(id) || id.contains(lower.as_str())))
    {
        return Some(*key);
    }

    asset.aliases().iter().find_map(|alias| {
        lowered
            .iter()
            .find(|(_, lower)| lower.contains(alias))
            .map(|(key, _)| *key)
    })
}

/// Coerce a JSON value into a number, tolerating currency symbols and
/// thousands separators. Anything unparseable becomes `None`.
pub fn parse_loose_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => {
            let cleaned: String = raw
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
