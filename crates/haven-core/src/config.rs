//! Runtime configuration.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Vars | Default |
//! |---------|-----------------|-------------------|---------|
//! | API key | `HAVEN_GEMINI_API_KEY` | `GEMINI_API_KEY`, `API_KEY` | none |
//! | Model | `HAVEN_MODEL` | - | `gemini-3-flash-preview` |
//! | Home directory | `HAVEN_HOME` | - | `~/.haven` |
//! | Calibration file | `HAVEN_CALIBRATION` | - | built-in table |
//! | Request timeout | `HAVEN_TIMEOUT_MS` | - | `30000` |

use std::env;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{resolve_haven_home, FileStore, TrendCache};
use crate::calibration::CalibrationTable;
use crate::genai::{GeminiClient, DEFAULT_MODEL};
use crate::journal::Journal;
use crate::CoreError;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, PartialEq, Eq)]
pub struct HavenConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub home: PathBuf,
    pub calibration_path: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for HavenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: String::from(DEFAULT_MODEL),
            home: resolve_haven_home(),
            calibration_path: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Debug for HavenConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HavenConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("home", &self.home)
            .field("calibration_path", &self.calibration_path)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl HavenConfig {
    pub fn from_env() -> Self {
        let api_key = ["HAVEN_GEMINI_API_KEY", "GEMINI_API_KEY", "API_KEY"]
            .into_iter()
            .find_map(non_empty_var);

        Self {
            api_key,
            model: non_empty_var("HAVEN_MODEL").unwrap_or_else(|| String::from(DEFAULT_MODEL)),
            home: resolve_haven_home(),
            calibration_path: non_empty_var("HAVEN_CALIBRATION").map(PathBuf::from),
            timeout_ms: non_empty_var("HAVEN_TIMEOUT_MS")
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Built-in table, or the YAML overrides at `calibration_path`.
    pub fn calibration(&self) -> Result<CalibrationTable, CoreError> {
        match &self.calibration_path {
            Some(path) => CalibrationTable::load(path),
            None => Ok(CalibrationTable::default()),
        }
    }

    pub fn file_cache(&self) -> TrendCache {
        TrendCache::new(Arc::new(FileStore::new(self.cache_dir())))
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.home.join("journal")
    }

    pub fn journal(&self) -> Journal {
        Journal::new(Arc::new(FileStore::new(self.journal_dir())))
    }

    /// `None` when no API key is configured.
    pub fn gemini_client(&self) -> Option<GeminiClient> {
        let key = self.api_key.as_ref()?;
        Some(
            GeminiClient::new(key.as_str())
                .with_model(self.model.as_str())
                .with_timeout_ms(self.timeout_ms),
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_api_key() {
        let config = HavenConfig {
            api_key: Some(String::from("super-secret")),
            ..HavenConfig::default()
        };

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_key_yields_no_client() {
        assert!(HavenConfig::default().gemini_client().is_none());
    }

    #[test]
    fn cache_dir_lives_under_home() {
        let config = HavenConfig {
            home: PathBuf::from("/tmp/haven-test"),
            ..HavenConfig::default()
        };
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/haven-test/cache"));
        assert_eq!(config.journal_dir(), PathBuf::from("/tmp/haven-test/journal"));
    }
}
