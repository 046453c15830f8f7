//! TTL-aware result cache over a pluggable key-value store.
//!
//! Records are stored as JSON strings carrying their own write timestamp.
//! Expiry is decided on read; stale records are never swept, they are
//! simply ignored and later overwritten.

use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{AssetId, DataOrigin, DateWindow, SourceCitation};

/// Bumped whenever the cached payload shape changes.
pub const CACHE_SCHEMA_VERSION: &str = "v3";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache store io error: {0}")]
    Io(String),
    #[error("cache record serialization failed: {0}")]
    Serialization(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Flat string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    /// Returns whether a value was removed.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.inner.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner.write().await.insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.inner.write().await.remove(key).is_some()) })
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            match tokio::fs::read_to_string(self.path_for(key)).await {
                Ok(contents) => Ok(Some(contents)),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
                Err(error) => Err(CacheError::Io(error.to_string())),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.root)
                .await
                .map_err(|e| CacheError::Io(e.to_string()))?;
            let path = self.path_for(key);
            let staging = path.with_extension("json.tmp");
            tokio::fs::write(&staging, value)
                .await
                .map_err(|e| CacheError::Io(e.to_string()))?;
            tokio::fs::rename(&staging, &path)
                .await
                .map_err(|e| CacheError::Io(e.to_string()))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(true),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
                Err(error) => Err(CacheError::Io(error.to_string())),
            }
        })
    }
}

/// Resolve the haven home directory from environment or default.
pub fn resolve_haven_home() -> PathBuf {
    if let Some(path) = env::var_os("HAVEN_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".haven");
    }

    PathBuf::from(".haven")
}

/// Persisted payload plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceCitation>,
    /// Write time, epoch milliseconds.
    pub timestamp: u64,
    pub source: DataOrigin,
}

impl<T> CacheRecord<T> {
    pub fn new(data: T, source: DataOrigin) -> Self {
        Self {
            data,
            insight: None,
            sources: Vec::new(),
            timestamp: now_epoch_ms(),
            source,
        }
    }

    pub fn with_insight(mut self, insight: Option<String>) -> Self {
        self.insight = insight;
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }
}

/// Deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a multi-asset comparison: window length and end month plus
    /// sorted identifiers.
    pub fn comparison(assets: &[AssetId], window: DateWindow) -> Self {
        let mut ids: Vec<&str> = assets.iter().map(|asset| asset.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        Self(format!(
            "comp_{CACHE_SCHEMA_VERSION}_{}m_{}_{}",
            window.len_months(),
            window.end,
            ids.join("_")
        ))
    }

    /// Key for a single-asset view; includes the query text itself.
    pub fn trend(asset: AssetId, query: &str, window: DateWindow) -> Self {
        Self(format!(
            "trend_{CACHE_SCHEMA_VERSION}_{}_{}_{}",
            asset.as_str(),
            slug(query),
            window.start
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn slug(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            output.extend(ch.to_lowercase());
        } else if !output.ends_with('-') && !output.is_empty() {
            output.push('-');
        }
    }
    let trimmed = output.trim_end_matches('-');
    trimmed.chars().take(64).collect()
}

/// Result cache with per-call-site TTLs.
#[derive(Clone)]
pub struct TrendCache {
    store: Arc<dyn KeyValueStore>,
    comparison_ttl: Duration,
    trend_ttl: Duration,
    enabled: bool,
}

impl TrendCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            comparison_ttl: Duration::from_secs(6 * 60 * 60),
            trend_ttl: Duration::from_secs(24 * 60 * 60),
            enabled: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::in_memory()
        }
    }

    pub fn with_comparison_ttl(mut self, ttl: Duration) -> Self {
        self.comparison_ttl = ttl;
        self
    }

    pub fn with_trend_ttl(mut self, ttl: Duration) -> Self {
        self.trend_ttl = ttl;
        self
    }

    pub const fn comparison_ttl(&self) -> Duration {
        self.comparison_ttl
    }

    pub const fn trend_ttl(&self) -> Duration {
        self.trend_ttl
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Read a fresh record. Missing, unreadable, corrupt and expired
    /// records are all reported as a miss.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        ttl: Duration,
    ) -> Option<CacheRecord<T>> {
        if !self.enabled {
            return None;
        }

        let raw = match self.store.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = key.as_str(), "cache miss");
                return None;
            }
            Err(error) => {
                warn!(key = key.as_str(), %error, "cache read failed; treating as miss");
                return None;
            }
        };

        let record: CacheRecord<T> = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(error) => {
                warn!(key = key.as_str(), %error, "corrupt cache record; treating as miss");
                return None;
            }
        };

        let ttl_ms = ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        if record.age_ms(now_epoch_ms()) >= ttl_ms {
            debug!(key = key.as_str(), "cache record expired");
            return None;
        }

        debug!(key = key.as_str(), "cache hit");
        Some(record)
    }

    pub async fn write<T: Serialize>(
        &self,
        key: &CacheKey,
        record: &CacheRecord<T>,
    ) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let raw =
            serde_json::to_string(record).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.set(key.as_str(), raw).await
    }

    /// Remove exactly one key. Other entries are untouched.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.store.delete(key.as_str()).await
    }
}

pub fn now_epoch_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000).clamp(0, i128::from(u64::MAX)) as u64
}
