//! Behaviour tests for the trend normalization pipeline.
//!
//! These tests drive `TrendNormalizer` end to end with a scripted generator
//! and an in-memory cache, checking which stage served each request, what
//! was cached and how many outbound calls were made.

mod support;

use std::sync::Arc;

use haven_core::normalizer::{STATUS_BASELINE, STATUS_DEGRADED, STATUS_LIVE};
use haven_core::{
    AssetId, CacheKey, DataOrigin, DateWindow, FetchOptions, GenError, KeyValueStore, MemoryStore,
    Scale, StageId, TrendCache, TrendNormalizer,
};

use support::{five_year_window, single_asset_answer, twelve_month_window, ScriptedGenerator};

fn normalizer_with(generator: Arc<ScriptedGenerator>, store: Arc<MemoryStore>) -> TrendNormalizer {
    TrendNormalizer::builder()
        .with_generator(generator)
        .with_cache(TrendCache::new(store))
        .with_seed(42)
        .build()
}

// =============================================================================
// Caching: one outbound call per key within the TTL
// =============================================================================

#[tokio::test]
async fn when_same_trend_is_requested_twice_within_ttl_only_one_call_is_made() {
    // Given: A grounded stage that answers with plausible gold anchors
    let window = five_year_window();
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: The identical request is made twice
    let first = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");
    let second = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: Exactly one outbound call was made and the second answer is the cached one
    assert_eq!(generator.total_calls(), 1);
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.series, second.series);
    assert_eq!(second.origin, DataOrigin::Real);
}

#[tokio::test]
async fn when_same_comparison_is_requested_twice_no_new_calls_are_made() {
    // Given: A grounded stage answering for two indices and an insight generator
    let window = twelve_month_window();
    let answer = format!(
        "```json\n[{{\"date\": \"{}\", \"S&P 500\": 5700, \"NASDAQ-100\": \"19,800\"}}, \
         {{\"date\": \"{}\", \"S&P 500\": 6600, \"NASDAQ-100\": \"24,100\"}}]\n```",
        window.start, window.end
    );
    let generator = Arc::new(
        ScriptedGenerator::new()
            .on_grounded(answer)
            .on_plain("Both indices rose steadily. Keep breathing."),
    );
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));
    let assets = [AssetId::Nasdaq, AssetId::Sp500];

    // When: The comparison is requested twice in different asset order
    let first = normalizer
        .compare(&assets, window, FetchOptions::default())
        .await
        .expect("valid request");
    let calls_after_first = generator.total_calls();
    let second = normalizer
        .compare(&[AssetId::Sp500, AssetId::Nasdaq], window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: One anchor call plus one insight call, nothing for the repeat
    assert_eq!(generator.grounded_calls(), 1);
    assert_eq!(generator.plain_calls(), 1);
    assert_eq!(generator.total_calls(), calls_after_first);
    assert!(second.cache_hit);
    assert_eq!(first.insight.as_deref(), Some("Both indices rose steadily. Keep breathing."));
    assert_eq!(second.insight, first.insight);
    assert_eq!(second.status_line(), STATUS_LIVE);
}

#[tokio::test]
async fn when_refresh_is_forced_cached_entry_is_dropped_and_refetched() {
    // Given: A cached gold trend
    let window = five_year_window();
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));
    normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // When: The same request is made with a forced refresh
    let refreshed = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default().refresh())
        .await
        .expect("valid request");

    // Then: The service is called again and the answer is fresh
    assert_eq!(generator.grounded_calls(), 2);
    assert!(!refreshed.cache_hit);
}

#[tokio::test]
async fn when_refresh_is_forced_unrelated_cache_keys_survive() {
    // Given: Cached gold and bitcoin trends in the same store
    let window = five_year_window();
    let store = Arc::new(MemoryStore::new());
    let gold = Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(Arc::clone(&gold), Arc::clone(&store));
    normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");
    let bitcoin_key = normalizer.trend_key(AssetId::Bitcoin, None, window);
    store
        .set(bitcoin_key.as_str(), String::from("{\"placeholder\":true}"))
        .await
        .expect("seed store");

    // When: Gold is refreshed
    normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default().refresh())
        .await
        .expect("valid request");

    // Then: The bitcoin entry is untouched
    assert!(store
        .get(bitcoin_key.as_str())
        .await
        .expect("store readable")
        .is_some());
}

#[tokio::test]
async fn when_trend_has_a_description_it_is_prompted_and_cached_separately() {
    // Given: A cached gold trend under the built-in query
    let window = five_year_window();
    let store = Arc::new(MemoryStore::new());
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::clone(&store));
    normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // When: The same asset is requested with a custom description
    let described = FetchOptions::default().with_description("  Gold futures, front month ");
    let outcome = normalizer
        .fetch_trend(AssetId::Gold, window, described)
        .await
        .expect("valid request");

    // Then: A new call is made, its prompt names the description, and both keys are stored
    assert!(!outcome.cache_hit);
    assert_eq!(generator.grounded_calls(), 2);
    let requests = generator.requests();
    assert!(requests[1].prompt.contains("Gold futures, front month"));
    assert!(!requests[0].prompt.contains("Gold futures"));

    let default_key = normalizer.trend_key(AssetId::Gold, None, window);
    let described_key =
        normalizer.trend_key(AssetId::Gold, Some("Gold futures, front month"), window);
    assert_ne!(default_key, described_key);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn when_comparisons_share_a_length_but_end_in_different_months_both_are_fetched() {
    // Given: Two twelve-month windows ending a month apart
    let later = twelve_month_window();
    let earlier = DateWindow::trailing_months(12, later.end.add_months(-1)).expect("valid window");
    let answer = format!(
        "[{{\"date\": \"{}\", \"gold\": 2600, \"btc\": 62000}}, {{\"date\": \"{}\", \"gold\": 4000, \"btc\": 105000}}]",
        earlier.start, later.end
    );
    let generator = Arc::new(ScriptedGenerator::new().on_grounded(answer));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));
    let assets = [AssetId::Gold, AssetId::Bitcoin];

    // When: Both are compared
    normalizer
        .compare(&assets, later, FetchOptions::default())
        .await
        .expect("valid request");
    let second = normalizer
        .compare(&assets, earlier, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: The second window is not served from the first window's entry
    assert!(!second.cache_hit);
    assert_eq!(generator.grounded_calls(), 2);
    assert_ne!(
        normalizer.comparison_key(&assets, later),
        normalizer.comparison_key(&assets, earlier)
    );
}

// =============================================================================
// Plausibility gate and the synthetic fallback
// =============================================================================

#[tokio::test]
async fn when_gold_anchor_is_implausible_series_is_flagged_synthetic() {
    // Given: Both stages report a latest gold price of 9999
    let window = five_year_window();
    let implausible = single_asset_answer(window, 1850.0, 9999.0);
    let structured = format!(
        "[{{\"date\": \"{}\", \"value\": 1850}}, {{\"date\": \"{}\", \"value\": 9999}}]",
        window.start, window.end
    );
    let generator = Arc::new(
        ScriptedGenerator::new()
            .on_grounded(implausible)
            .on_structured(structured),
    );
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: The gold trend is requested
    let outcome = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: The displayed series is synthetic and says so
    assert_eq!(outcome.origin, DataOrigin::Simulated);
    assert_eq!(
        outcome.stage_chain,
        vec![StageId::Grounded, StageId::Structured, StageId::Synthetic]
    );
    assert_eq!(outcome.status_line(), STATUS_BASELINE);
    assert!(outcome.errors.iter().all(|e| e.code == "stage.implausible_data"));
    assert!(outcome.series.points.iter().all(|p| p.value < 9999.0));
    assert_eq!(outcome.series.points.len(), window.len_months());
}

#[tokio::test]
async fn when_result_is_synthetic_next_request_retries_live_stages() {
    // Given: A service that is down
    let window = five_year_window();
    let generator = Arc::new(
        ScriptedGenerator::new().on_grounded_error(GenError::Timeout),
    );
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: The same trend is requested twice
    for _ in 0..2 {
        let outcome = normalizer
            .fetch_trend(AssetId::Bitcoin, window, FetchOptions::default())
            .await
            .expect("valid request");
        assert!(outcome.origin.is_synthetic());
        assert!(!outcome.cache_hit);
    }

    // Then: Both requests went through both live stages
    assert_eq!(generator.grounded_calls(), 2);
    assert_eq!(generator.structured_calls(), 2);
}

#[tokio::test]
async fn when_grounded_answer_is_malformed_structured_stage_serves_real_data() {
    // Given: Prose without JSON from the grounded stage, valid schema output from the structured one
    let window = five_year_window();
    let structured = format!(
        "[{{\"date\": \"{}\", \"value\": 33000}}, {{\"date\": \"{}\", \"value\": 104000}}]",
        window.start, window.end
    );
    let generator = Arc::new(
        ScriptedGenerator::new()
            .on_grounded("I could not find reliable monthly prices.")
            .on_structured(structured),
    );
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: The bitcoin trend is requested
    let outcome = normalizer
        .fetch_trend(AssetId::Bitcoin, window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: Real data from the degraded path, with the grounded failure recorded
    assert_eq!(outcome.origin, DataOrigin::Real);
    assert_eq!(outcome.stage_chain, vec![StageId::Grounded, StageId::Structured]);
    assert_eq!(outcome.status_line(), STATUS_DEGRADED);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].code, "stage.malformed_response");

    let requests = generator.requests();
    let schema = requests[1].response_schema.as_ref().expect("schema sent");
    assert_eq!(schema["items"]["required"][1], "value");
    assert!(!requests[1].grounded);
}

// =============================================================================
// Series shape
// =============================================================================

#[tokio::test]
async fn when_real_anchors_are_accepted_they_survive_interpolation_verbatim() {
    // Given: Anchors at both ends of a five-year window
    let window = five_year_window();
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(generator, Arc::new(MemoryStore::new()));

    // When: The trend is fetched in absolute scale
    let outcome = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: One point per month, ascending, anchors unchanged
    let points = &outcome.series.points;
    assert_eq!(points.len(), 61);
    assert!(points.windows(2).all(|pair| pair[0].date < pair[1].date));
    assert_eq!(points[0].value, 1850.0);
    assert_eq!(points[60].value, 4100.0);
    assert_eq!(outcome.scale, Scale::Absolute);
}

#[tokio::test]
async fn when_percent_scale_is_requested_series_starts_at_one_hundred() {
    // Given: A cached absolute trend
    let window = five_year_window();
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 2000.0, 4000.0)));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));
    normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // When: The same trend is requested in percent scale
    let outcome = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default().with_scale(Scale::Percent))
        .await
        .expect("valid request");

    // Then: It is served from cache and rebased
    assert!(outcome.cache_hit);
    assert_eq!(generator.total_calls(), 1);
    assert_eq!(outcome.series.points[0].value, 100.0);
    assert_eq!(outcome.series.points[60].value, 200.0);
}

#[tokio::test]
async fn when_insight_call_fails_comparison_still_succeeds_without_insight() {
    // Given: Plausible anchors but no scripted insight answer
    let window = twelve_month_window();
    let answer = format!(
        "[{{\"date\": \"{}\", \"gold\": 2600, \"btc\": 62000}}, {{\"date\": \"{}\", \"gold\": 4000, \"btc\": 105000}}]",
        window.start, window.end
    );
    let generator = Arc::new(ScriptedGenerator::new().on_grounded(answer));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: The comparison runs
    let outcome = normalizer
        .compare(&[AssetId::Gold, AssetId::Bitcoin], window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: Real rebased rows, no insight, and the insight was attempted once
    assert_eq!(outcome.origin, DataOrigin::Real);
    assert!(outcome.insight.is_none());
    assert_eq!(generator.plain_calls(), 1);
    assert_eq!(outcome.rows.len(), window.len_months());
    assert_eq!(outcome.rows[0].values[&AssetId::Gold], 100.0);
    assert_eq!(outcome.rows[0].values[&AssetId::Bitcoin], 100.0);
}

#[tokio::test]
async fn when_comparison_falls_back_no_insight_call_is_made() {
    // Given: A service that only answers plain requests
    let generator = Arc::new(ScriptedGenerator::new().on_plain("should not be used"));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::new(MemoryStore::new()));

    // When: A comparison cannot get real anchors
    let outcome = normalizer
        .compare(&[AssetId::Sp500, AssetId::Gold], twelve_month_window(), FetchOptions::default())
        .await
        .expect("valid request");

    // Then: Synthetic rows, no insight requested
    assert_eq!(outcome.origin, DataOrigin::Simulated);
    assert!(outcome.insight.is_none());
    assert_eq!(generator.plain_calls(), 0);
}

#[tokio::test]
async fn when_cached_record_is_corrupt_it_is_treated_as_a_miss() {
    // Given: Garbage stored under the trend key
    let window = five_year_window();
    let store = Arc::new(MemoryStore::new());
    let generator =
        Arc::new(ScriptedGenerator::new().on_grounded(single_asset_answer(window, 1850.0, 4100.0)));
    let normalizer = normalizer_with(Arc::clone(&generator), Arc::clone(&store));
    let key: CacheKey = normalizer.trend_key(AssetId::Gold, None, window);
    store
        .set(key.as_str(), String::from("{not json"))
        .await
        .expect("seed store");

    // When: The trend is requested
    let outcome = normalizer
        .fetch_trend(AssetId::Gold, window, FetchOptions::default())
        .await
        .expect("valid request");

    // Then: The pipeline fetched fresh data and overwrote the entry
    assert!(!outcome.cache_hit);
    assert_eq!(generator.grounded_calls(), 1);
    let raw = store.get(key.as_str()).await.expect("readable").expect("rewritten");
    assert!(raw.contains("\"source\":\"real\""));
}
