//! Investment journal.
//!
//! One check-in per calendar day with an intensity level of 0 to 4 and an
//! optional note, stored as a single JSON array under [`JOURNAL_KEY`] in any
//! [`KeyValueStore`]. The journal feeds a streak counter and a trailing-year
//! calendar grouped by month.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration};
use tracing::{debug, warn};

use crate::cache::{CacheError, KeyValueStore, MemoryStore};
use crate::{ValidationError, YearMonth};

pub const JOURNAL_KEY: &str = "haven_invest_records";
pub const MAX_LEVEL: u8 = 4;
pub const DEFAULT_LEVEL: u8 = MAX_LEVEL;
pub const STREAK_CAP_DAYS: u32 = 365;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Store(#[from] CacheError),
    #[error("journal under '{key}' is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Calendar day serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JournalDate(Date);

impl JournalDate {
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Date::parse(raw.trim(), DATE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: raw.to_owned(),
            })
    }

    pub const fn date(self) -> Date {
        self.0
    }
}

impl From<Date> for JournalDate {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl Display for JournalDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for JournalDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JournalDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub date: JournalDate,
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl JournalEntry {
    /// Blank notes are dropped.
    pub fn new(date: Date, level: u8, note: Option<String>) -> Result<Self, ValidationError> {
        if level > MAX_LEVEL {
            return Err(ValidationError::InvalidJournalLevel { level });
        }

        let note = note
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        Ok(Self {
            date: JournalDate(date),
            level,
            note,
        })
    }
}

/// One cell of the trailing-year calendar. Unrecorded days have level 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalDay {
    pub date: JournalDate,
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalMonth {
    pub month: YearMonth,
    pub days: Vec<JournalDay>,
}

#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn KeyValueStore>,
}

impl Journal {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// All entries, oldest first. A missing journal is empty; an unreadable
    /// one is an error so the next write cannot silently replace it.
    pub async fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let Some(raw) = self.store.get(JOURNAL_KEY).await? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<JournalEntry> =
            serde_json::from_str(&raw).map_err(|error| {
                warn!(key = JOURNAL_KEY, %error, "corrupt journal");
                JournalError::Corrupt {
                    key: String::from(JOURNAL_KEY),
                    reason: error.to_string(),
                }
            })?;
        entries.sort_by_key(|entry| entry.date);
        entries.dedup_by_key(|entry| entry.date);
        Ok(entries)
    }

    /// Insert or replace the entry for its date. Returns the updated journal.
    pub async fn record(&self, entry: JournalEntry) -> Result<Vec<JournalEntry>, JournalError> {
        let mut entries = self.entries().await?;
        match entries.binary_search_by_key(&entry.date, |existing| existing.date) {
            Ok(index) => entries[index] = entry,
            Err(index) => entries.insert(index, entry),
        }

        let raw = serde_json::to_string(&entries)
            .map_err(|error| CacheError::Serialization(error.to_string()))?;
        self.store.set(JOURNAL_KEY, raw).await?;
        debug!(entries = entries.len(), "journal updated");
        Ok(entries)
    }

    /// Remove every entry. Returns whether anything was stored.
    pub async fn clear(&self) -> Result<bool, JournalError> {
        Ok(self.store.delete(JOURNAL_KEY).await?)
    }

    pub async fn streak(&self, today: Date) -> Result<u32, JournalError> {
        Ok(streak(&self.entries().await?, today))
    }

    pub async fn trailing_year(&self, today: Date) -> Result<Vec<JournalMonth>, JournalError> {
        Ok(trailing_year(&self.entries().await?, today))
    }
}

/// Consecutive recorded days ending today, or ending yesterday when today
/// has no entry yet. Capped at [`STREAK_CAP_DAYS`].
pub fn streak(entries: &[JournalEntry], today: Date) -> u32 {
    let recorded = |day: Date| entries.iter().any(|entry| entry.date.date() == day);

    let mut cursor = if recorded(today) {
        Some(today)
    } else {
        today.previous_day()
    };
    let mut count = 0;
    while count < STREAK_CAP_DAYS {
        match cursor {
            Some(day) if recorded(day) => {
                count += 1;
                cursor = day.previous_day();
            }
            _ => break,
        }
    }
    count
}

/// Every day from one year before `today` (exclusive) through `today`,
/// grouped into calendar months, oldest first.
pub fn trailing_year(entries: &[JournalEntry], today: Date) -> Vec<JournalMonth> {
    let Some(start) = year_before(today).and_then(Date::next_day) else {
        return Vec::new();
    };

    let mut months: BTreeMap<YearMonth, Vec<JournalDay>> = BTreeMap::new();
    let mut cursor = Some(start);
    while let Some(day) = cursor.filter(|day| *day <= today) {
        let entry = entries.iter().find(|entry| entry.date.date() == day);
        months
            .entry(YearMonth::from_date(day))
            .or_default()
            .push(JournalDay {
                date: JournalDate(day),
                level: entry.map_or(0, |entry| entry.level),
                note: entry.and_then(|entry| entry.note.clone()),
            });
        cursor = day.next_day();
    }

    months
        .into_iter()
        .map(|(month, days)| JournalMonth { month, days })
        .collect()
}

// Feb 29 has no counterpart a year earlier; roll forward to Mar 1.
fn year_before(today: Date) -> Option<Date> {
    today
        .replace_year(today.year() - 1)
        .ok()
        .or_else(|| today.checked_sub(Duration::days(365)))
}
