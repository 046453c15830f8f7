//! # Haven Core
//!
//! Trend normalization for the Focus Capsule: turns sparse, unreliable
//! price anchors from a hosted text-generation service into chartable
//! monthly series, with a calibrated synthetic baseline when no
//! trustworthy data is available.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`anchors`] | Anchor queries, rows and sets |
//! | [`cache`] | Key-value stores and the TTL result cache |
//! | [`calibration`] | Plausibility bands and synthetic constants |
//! | [`companion`] | Daily quote, aphorisms, headline de-noising, future letter |
//! | [`config`] | Environment-driven configuration |
//! | [`domain`] | Assets, months, windows and series |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`extract`] | JSON recovery from generated text |
//! | [`genai`] | Text-generation client |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`journal`] | Daily investment journal, streaks and calendar |
//! | [`normalizer`] | The end-to-end pipeline |
//! | [`providers`] | Anchor stages |
//! | [`retry`] | Retry and backoff policy |
//! | [`routing`] | Stage ordering and plausibility gating |
//! | [`series`] | Interpolation, synthetic baseline and rebasing |
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐  hit   ┌──────────────┐
//! │  TrendCache  │───────▶│   outcome    │
//! └──────┬───────┘        └──────────────┘
//!        │ miss
//!        ▼
//! ┌──────────────┐     ┌──────────────────────────────┐
//! │ AnchorRouter │────▶│ grounded ─▶ structured stage │
//! └──────┬───────┘     └──────────────────────────────┘
//!        │ accepted              │ all rejected
//!        ▼                       ▼
//! ┌──────────────┐     ┌──────────────────┐
//! │ interpolate  │     │ synthetic series │
//! │ + cache      │     │ (not cached)     │
//! └──────────────┘     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use haven_core::{AssetId, DateWindow, FetchOptions, HavenConfig, TrendNormalizer, YearMonth};
//!
//! let config = HavenConfig::from_env();
//! let mut builder = TrendNormalizer::builder().with_cache(config.file_cache());
//! if let Some(client) = config.gemini_client() {
//!     builder = builder.with_generator(Arc::new(client));
//! }
//! let normalizer = builder.build();
//!
//! let window = DateWindow::trailing_years(5, YearMonth::current())?;
//! let outcome = normalizer.fetch_trend(AssetId::Gold, window, FetchOptions::default()).await?;
//! println!("{} points, {}", outcome.series.points.len(), outcome.status_line());
//! ```
//!
//! ## Security
//!
//! - The API key is read from the environment and never logged
//! - All HTTP requests use TLS via rustls

pub mod anchors;
pub mod cache;
pub mod calibration;
pub mod companion;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod genai;
pub mod http_client;
pub mod journal;
pub mod normalizer;
pub mod providers;
pub mod retry;
pub mod routing;
pub mod series;

// Anchors
pub use anchors::{anchors_from_json, AnchorQuery, AnchorRow, AnchorSet};

// Caching
pub use cache::{
    CacheError, CacheKey, CacheRecord, FileStore, KeyValueStore, MemoryStore, TrendCache,
};

// Calibration
pub use calibration::{validate_anchor_set, AssetCalibration, CalibrationTable, PlausibilityError};

// Companion features
pub use companion::{daily_quote, CompanionText, DenoisedHeadline};

// Configuration
pub use config::HavenConfig;

// Domain models
pub use domain::{
    AssetId, AssetSeries, ComparisonRow, DataOrigin, DateWindow, Scale, SeriesPoint,
    SourceCitation, YearMonth,
};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};

// Error types
pub use error::{CoreError, ValidationError};

// Extraction
pub use extract::{extract_json_array, ExtractError};

// Generation client
pub use genai::{GeminiClient, GenError, GenerationRequest, GenerationResponse, TextGenerator};

// HTTP client types
pub use http_client::{
    CannedHttpClient, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Journal
pub use journal::{Journal, JournalDate, JournalDay, JournalEntry, JournalError, JournalMonth};

// Pipeline
pub use normalizer::{
    ComparisonOutcome, FetchOptions, TrendNormalizer, TrendNormalizerBuilder, TrendOutcome,
};

// Stages and routing
pub use providers::{
    AnchorProvider, GroundedAnchorProvider, StageError, StageErrorKind, StageId,
    StructuredAnchorProvider,
};
pub use routing::{AnchorRouter, RouteFailure, RouteResult, RouteSuccess, StageFailure};

// Retry logic
pub use retry::{Backoff, RetryPolicy};
