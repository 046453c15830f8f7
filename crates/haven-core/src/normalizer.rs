//! Trend normalization pipeline.
//!
//! A request runs cache lookup, staged anchor acquisition, interpolation
//! and scaling in that order. Stage failures never surface as errors; when
//! no stage yields plausible anchors the series comes from the calibrated
//! synthetic baseline and is flagged [`DataOrigin::Simulated`].

use std::sync::Arc;
use std::time::Instant;

use fastrand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anchors::{AnchorQuery, AnchorSet};
use crate::cache::{CacheKey, CacheRecord, TrendCache};
use crate::calibration::CalibrationTable;
use crate::genai::{GenerationRequest, TextGenerator};
use crate::providers::{AnchorProvider, StageId};
use crate::routing::{elapsed_ms, AnchorRouter, StageFailure};
use crate::series::{comparison_rows, interpolate_monthly, rebase_percent, synthetic_series};
use crate::{
    AssetId, AssetSeries, ComparisonRow, DataOrigin, DateWindow, Scale, SourceCitation,
    ValidationError, YearMonth,
};

pub const STATUS_LIVE: &str = "live market data";
pub const STATUS_DEGRADED: &str = "market connection degraded";
pub const STATUS_BASELINE: &str = "running on internal baseline";

/// Per-call switches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// Drop the cached entry for this request before fetching.
    pub force_refresh: bool,
    /// `None` picks the call's default scale.
    pub scale: Option<Scale>,
    /// Free-text description of what to price in a single-asset request.
    /// `None` uses the asset's built-in query.
    pub description: Option<String>,
}

impl FetchOptions {
    /// Blank text is ignored.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = Some(description.trim().to_owned()).filter(|text| !text.is_empty());
        self
    }

    pub fn refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }
}

fn status_for(origin: DataOrigin, stage_chain: &[StageId]) -> &'static str {
    match origin {
        DataOrigin::Simulated => STATUS_BASELINE,
        DataOrigin::Real if stage_chain.len() > 1 => STATUS_DEGRADED,
        DataOrigin::Real => STATUS_LIVE,
    }
}

/// Single-asset result.
#[derive(Debug, Clone, Serialize)]
pub struct TrendOutcome {
    pub series: AssetSeries,
    pub scale: Scale,
    pub origin: DataOrigin,
    pub cache_hit: bool,
    pub stage_chain: Vec<StageId>,
    pub warnings: Vec<String>,
    pub errors: Vec<StageFailure>,
    pub sources: Vec<SourceCitation>,
    pub latency_ms: u64,
}

impl TrendOutcome {
    pub fn status_line(&self) -> &'static str {
        status_for(self.origin, &self.stage_chain)
    }
}

/// Multi-asset result, rows keyed by month.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub rows: Vec<ComparisonRow>,
    pub series: Vec<AssetSeries>,
    pub insight: Option<String>,
    pub scale: Scale,
    pub origin: DataOrigin,
    pub cache_hit: bool,
    pub stage_chain: Vec<StageId>,
    pub warnings: Vec<String>,
    pub errors: Vec<StageFailure>,
    pub sources: Vec<SourceCitation>,
    pub latency_ms: u64,
}

impl ComparisonOutcome {
    pub fn status_line(&self) -> &'static str {
        status_for(self.origin, &self.stage_chain)
    }
}

struct Resolved {
    series: Vec<AssetSeries>,
    insight: Option<String>,
    origin: DataOrigin,
    cache_hit: bool,
    stage_chain: Vec<StageId>,
    warnings: Vec<String>,
    errors: Vec<StageFailure>,
    sources: Vec<SourceCitation>,
}

#[derive(Clone, Copy)]
enum CallSite {
    Trend,
    Comparison,
}

/// Orchestrates cache, stages, interpolation and the synthetic fallback.
#[derive(Clone)]
pub struct TrendNormalizer {
    router: AnchorRouter,
    calibration: Arc<CalibrationTable>,
    cache: TrendCache,
    insight_generator: Option<Arc<dyn TextGenerator>>,
    seed: Option<u64>,
    horizon: Option<YearMonth>,
}

impl TrendNormalizer {
    pub fn builder() -> TrendNormalizerBuilder {
        TrendNormalizerBuilder::default()
    }

    pub fn cache(&self) -> &TrendCache {
        &self.cache
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn stages(&self) -> Vec<StageId> {
        self.router.stages()
    }

    /// Latest month a request may cover.
    pub fn upper_bound(&self) -> YearMonth {
        let current = YearMonth::current();
        self.horizon.map_or(current, |horizon| horizon.min(current))
    }

    /// Key under which [`Self::fetch_trend`] caches `asset` for `window`,
    /// given the same description it was called with.
    pub fn trend_key(
        &self,
        asset: AssetId,
        description: Option<&str>,
        window: DateWindow,
    ) -> CacheKey {
        let window = window.clamp_end(self.upper_bound());
        let query = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(asset.query());
        CacheKey::trend(asset, query, window)
    }

    pub fn comparison_key(&self, assets: &[AssetId], window: DateWindow) -> CacheKey {
        let window = window.clamp_end(self.upper_bound());
        CacheKey::comparison(assets, window)
    }

    /// Monthly series for one asset; absolute scale unless asked otherwise.
    pub async fn fetch_trend(
        &self,
        asset: AssetId,
        window: DateWindow,
        options: FetchOptions,
    ) -> Result<TrendOutcome, ValidationError> {
        let started = Instant::now();
        let key = self.trend_key(asset, options.description.as_deref(), window);
        let window = window.clamp_end(self.upper_bound());
        let mut query = AnchorQuery::single(asset, window);
        if let Some(description) = options.description {
            query = query.with_description(description);
        }
        let scale = options.scale.unwrap_or(Scale::Absolute);

        let mut resolved = self
            .resolve(&query, &key, CallSite::Trend, options.force_refresh)
            .await;
        let mut series = resolved.series.pop().unwrap_or_else(|| AssetSeries {
            asset,
            points: Vec::new(),
        });
        series.validate_ordering()?;
        if scale == Scale::Percent {
            series.points = rebase_percent(&series.points);
        }

        Ok(TrendOutcome {
            series,
            scale,
            origin: resolved.origin,
            cache_hit: resolved.cache_hit,
            stage_chain: resolved.stage_chain,
            warnings: resolved.warnings,
            errors: resolved.errors,
            sources: resolved.sources,
            latency_ms: elapsed_ms(started),
        })
    }

    /// Month rows for several assets; percent scale unless asked otherwise.
    pub async fn compare(
        &self,
        assets: &[AssetId],
        window: DateWindow,
        options: FetchOptions,
    ) -> Result<ComparisonOutcome, ValidationError> {
        let started = Instant::now();
        let window = window.clamp_end(self.upper_bound());
        let query = AnchorQuery::new(assets.to_vec(), window)?;
        let key = CacheKey::comparison(&query.assets, window);
        let scale = options.scale.unwrap_or(Scale::Percent);

        let resolved = self
            .resolve(&query, &key, CallSite::Comparison, options.force_refresh)
            .await;

        let mut series = resolved.series;
        for entry in &mut series {
            entry.validate_ordering()?;
            if scale == Scale::Percent {
                entry.points = rebase_percent(&entry.points);
            }
        }

        Ok(ComparisonOutcome {
            rows: comparison_rows(&series),
            series,
            insight: resolved.insight,
            scale,
            origin: resolved.origin,
            cache_hit: resolved.cache_hit,
            stage_chain: resolved.stage_chain,
            warnings: resolved.warnings,
            errors: resolved.errors,
            sources: resolved.sources,
            latency_ms: elapsed_ms(started),
        })
    }

    async fn resolve(
        &self,
        query: &AnchorQuery,
        key: &CacheKey,
        site: CallSite,
        force_refresh: bool,
    ) -> Resolved {
        let ttl = match site {
            CallSite::Trend => self.cache.trend_ttl(),
            CallSite::Comparison => self.cache.comparison_ttl(),
        };

        if force_refresh {
            match self.cache.invalidate(key).await {
                Ok(removed) => debug!(key = key.as_str(), removed, "cache entry invalidated"),
                Err(error) => warn!(key = key.as_str(), %error, "cache invalidation failed"),
            }
        } else if let Some(record) = self.cache.read::<Vec<AssetSeries>>(key, ttl).await {
            return Resolved {
                series: record.data,
                insight: record.insight,
                origin: record.source,
                cache_hit: true,
                stage_chain: Vec::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
                sources: record.sources,
            };
        }

        let mut rng = self.rng();
        match self.router.route(query).await {
            Ok(success) => {
                let series = self.interpolate(query, &success.data, &mut rng);
                let insight = match site {
                    CallSite::Comparison => self.insight(&series).await,
                    CallSite::Trend => None,
                };
                let sources = success.data.sources;

                let record = CacheRecord::new(series.clone(), DataOrigin::Real)
                    .with_insight(insight.clone())
                    .with_sources(sources.clone());
                if let Err(error) = self.cache.write(key, &record).await {
                    warn!(key = key.as_str(), %error, "cache write failed");
                }

                Resolved {
                    series,
                    insight,
                    origin: DataOrigin::Real,
                    cache_hit: false,
                    stage_chain: success.stage_chain,
                    warnings: success.warnings,
                    errors: success.errors,
                    sources,
                }
            }
            Err(failure) => {
                info!(subject = %query.subject(), "using synthetic baseline");
                let series = query
                    .assets
                    .iter()
                    .map(|asset| synthetic_series(*asset, query.window, &self.calibration, &mut rng))
                    .collect();
                let mut stage_chain = failure.stage_chain;
                stage_chain.push(StageId::Synthetic);

                Resolved {
                    series,
                    insight: None,
                    origin: DataOrigin::Simulated,
                    cache_hit: false,
                    stage_chain,
                    warnings: failure.warnings,
                    errors: failure.errors,
                    sources: Vec::new(),
                }
            }
        }
    }

    fn interpolate(&self, query: &AnchorQuery, set: &AnchorSet, rng: &mut Rng) -> Vec<AssetSeries> {
        query
            .assets
            .iter()
            .map(|asset| AssetSeries {
                asset: *asset,
                points: interpolate_monthly(
                    &set.series_for(*asset),
                    self.calibration.interpolation_noise,
                    rng,
                ),
            })
            .collect()
    }

    /// Short narrative over real data. Failure just omits the insight.
    async fn insight(&self, series: &[AssetSeries]) -> Option<String> {
        let generator = self.insight_generator.as_ref()?;
        let summary: Vec<String> = series
            .iter()
            .filter_map(|entry| {
                let growth = entry.growth_percent()?;
                let first = entry.first()?.date;
                let last = entry.last()?.date;
                Some(format!(
                    "{}: {growth:+.1}% from {first} to {last}",
                    entry.asset.label()
                ))
            })
            .collect();
        if summary.is_empty() {
            return None;
        }

        let request = GenerationRequest::new(format!(
            "Performance over the period:\n{}\nIn two sentences, give a calm long-term investor's \
             perspective on these moves. Do not give trading advice.",
            summary.join("\n")
        ))
        .with_system_instruction(
            "You are a composed long-horizon investing mentor. Keep the reader steady.",
        );

        match generator.generate(request).await {
            Ok(response) => Some(response.text.trim().to_owned()).filter(|text| !text.is_empty()),
            Err(error) => {
                warn!(code = error.code(), "insight generation failed");
                None
            }
        }
    }

    fn rng(&self) -> Rng {
        self.seed.map_or_else(Rng::new, Rng::with_seed)
    }
}

/// Builder for [`TrendNormalizer`].
///
/// A normalizer built without a generator or providers has no live stages
/// and always serves the synthetic baseline.
#[derive(Default)]
pub struct TrendNormalizerBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    providers: Option<Vec<Arc<dyn AnchorProvider>>>,
    insight_generator: Option<Arc<dyn TextGenerator>>,
    calibration: Option<CalibrationTable>,
    cache: Option<TrendCache>,
    seed: Option<u64>,
    horizon: Option<YearMonth>,
}

impl TrendNormalizerBuilder {
    /// Use `generator` for both anchor stages and the insight call.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replace the default stage list.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn AnchorProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_insight_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.insight_generator = Some(generator);
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_cache(mut self, cache: TrendCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fix the noise sequence for reproducible series.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cap request windows at `horizon` as well as at the current month.
    pub fn with_horizon(mut self, horizon: YearMonth) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn build(self) -> TrendNormalizer {
        let calibration = Arc::new(self.calibration.unwrap_or_default());
        let router = match (self.providers, &self.generator) {
            (Some(providers), _) => AnchorRouter::new(providers, Arc::clone(&calibration)),
            (None, Some(generator)) => {
                AnchorRouter::for_generator(Arc::clone(generator), Arc::clone(&calibration))
            }
            (None, None) => AnchorRouter::new(Vec::new(), Arc::clone(&calibration)),
        };

        TrendNormalizer {
            router,
            calibration,
            cache: self.cache.unwrap_or_else(TrendCache::in_memory),
            insight_generator: self.insight_generator.or(self.generator),
            seed: self.seed,
            horizon: self.horizon,
        }
    }
}
