//! Behavior-driven tests for the read-through series cache
//!
//! These tests verify HOW the cache decides between serving stored data and
//! calling the provider, and how fetched data is merged into the store.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use time::{Duration, OffsetDateTime};
use trendsig_core::{
    FetchWindow, HistoryRequest, MarketDataProvider, PointRecord, ProviderError, ProviderPacer,
    ProviderRecord, SeriesCache, SeriesId, SeriesStore, StoreConfig,
};

/// Provider that serves a fixed record set and counts calls.
struct ScriptedProvider {
    records: Vec<ProviderRecord>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn returning(records: Vec<ProviderRecord>) -> Self {
        Self {
            records,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn history<'a>(
        &'a self,
        _req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(ProviderError::unavailable("scripted outage"))
        } else {
            Ok(self.records.clone())
        };
        Box::pin(async move { result })
    }
}

fn open_store(dir: &tempfile::TempDir) -> Arc<SeriesStore> {
    Arc::new(
        SeriesStore::open(StoreConfig {
            trendsig_home: dir.path().to_path_buf(),
            db_path: dir.path().join("series.duckdb"),
            max_pool_size: 2,
        })
        .expect("store open"),
    )
}

fn cache_over(store: Arc<SeriesStore>, provider: Arc<dyn MarketDataProvider>) -> SeriesCache {
    SeriesCache::new(store, provider, ProviderPacer::from_millis(0))
}

/// Daily scalar records for the last `days` days ending today, with the
/// given close everywhere.
fn daily_records(days: i64, close: f64) -> Vec<ProviderRecord> {
    let today = OffsetDateTime::now_utc().date();
    (0..days)
        .map(|i| ProviderRecord {
            ts: (today - Duration::days(days - 1 - i)).midnight().assume_utc(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        })
        .collect()
}

// =============================================================================
// Cache: Cold and Warm Reads
// =============================================================================

#[tokio::test]
async fn when_a_series_is_unknown_it_is_fetched_and_persisted() {
    // Given: An empty store and a working provider
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let provider = Arc::new(ScriptedProvider::returning(daily_records(10, 100.0)));
    let cache = cache_over(store.clone(), provider.clone());
    let id = SeriesId::equity("AAPL").expect("valid id");

    // When: The user reads the series
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("series");

    // Then: The provider was called once and the store now holds the days
    assert_eq!(provider.calls(), 1);
    assert_eq!(series.len(), 10);
    let stored = store
        .read_series("equity:AAPL", None, None)
        .expect("read");
    assert_eq!(stored.len(), 10);
}

#[tokio::test]
async fn when_the_store_is_current_no_provider_call_happens() {
    // Given: A store freshly populated through the cache
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let provider = Arc::new(ScriptedProvider::returning(daily_records(10, 100.0)));
    let cache = cache_over(store, provider.clone());
    let id = SeriesId::equity("AAPL").expect("valid id");
    cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("warm up");

    // When: The user reads again
    cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("second read");

    // Then: The first call was the only one
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn when_two_readers_race_on_a_cold_series_only_one_fetch_runs() {
    // Given: A cold series and two concurrent readers
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let provider = Arc::new(ScriptedProvider::returning(daily_records(10, 100.0)));
    let cache = Arc::new(cache_over(store, provider.clone()));
    let id = SeriesId::equity("AAPL").expect("valid id");

    // When: Both read at once
    let (first, second) = tokio::join!(
        cache.get_series(&id, FetchWindow::OneMonth),
        cache.get_series(&id, FetchWindow::OneMonth),
    );

    // Then: The per-series lock serialized them; the loser saw fresh data
    assert_eq!(provider.calls(), 1);
    assert_eq!(first.expect("first").len(), 10);
    assert_eq!(second.expect("second").len(), 10);
}

// =============================================================================
// Cache: Incremental Merge
// =============================================================================

#[tokio::test]
async fn when_the_store_lags_only_the_gap_is_appended() {
    // Given: A store ten days behind, holding closes the provider disagrees
    // with on the overlap
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let today = OffsetDateTime::now_utc().date();
    let seeded: Vec<PointRecord> = (0..5)
        .map(|i| PointRecord {
            date: today - Duration::days(14 - i),
            open: None,
            high: None,
            low: None,
            close: 50.0,
            volume: None,
        })
        .collect();
    store
        .upsert_points("equity:AAPL", "scripted", &seeded)
        .expect("seed");

    // Provider serves the last 15 days at a different level
    let provider = Arc::new(ScriptedProvider::returning(daily_records(15, 100.0)));
    let cache = cache_over(store.clone(), provider.clone());
    let id = SeriesId::equity("AAPL").expect("valid id");

    // When: The user reads the series
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("series");

    // Then: Rows at or before the stored high-water mark are untouched and
    // exactly the missing days were appended
    assert_eq!(provider.calls(), 1);
    assert_eq!(series.len(), 15);
    let since = today - Duration::days(10);
    for point in &series.points {
        if point.date <= since {
            assert_eq!(point.close, 50.0, "overlap day {} was rewritten", point.date);
        } else {
            assert_eq!(point.close, 100.0);
        }
    }
}

#[tokio::test]
async fn when_the_same_day_repeats_in_a_response_the_last_record_wins() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let today = OffsetDateTime::now_utc().date();
    let duplicate_day = |close: f64| ProviderRecord {
        ts: today.midnight().assume_utc(),
        open: None,
        high: None,
        low: None,
        close,
        volume: None,
    };
    let provider = Arc::new(ScriptedProvider::returning(vec![
        duplicate_day(100.0),
        duplicate_day(102.0),
        duplicate_day(101.5),
    ]));
    let cache = cache_over(store, provider);
    let id = SeriesId::equity("AAPL").expect("valid id");

    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("series");
    assert_eq!(series.len(), 1);
    assert_eq!(series.points[0].close, 101.5);
}

// =============================================================================
// Cache: Provider Failures
// =============================================================================

#[tokio::test]
async fn when_the_first_fetch_fails_the_user_gets_an_empty_series() {
    // Given: Nothing stored and a dead provider
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let cache = cache_over(store.clone(), Arc::new(ScriptedProvider::failing()));
    let id = SeriesId::equity("GONE").expect("valid id");

    // When
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("must not error");

    // Then: Empty result, nothing committed, so a later request replans
    assert!(series.is_empty());
    assert_eq!(store.latest_date("equity:GONE").expect("latest"), None);
}

#[tokio::test]
async fn when_the_first_fetch_comes_back_empty_nothing_is_stored() {
    // Given: A provider that answers successfully with no records
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let provider = Arc::new(ScriptedProvider::returning(Vec::new()));
    let cache = cache_over(store.clone(), provider.clone());
    let id = SeriesId::equity("NEWCO").expect("valid id");

    // When
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("must not error");

    // Then: Empty series, no rows, and the next read plans another fetch
    assert!(series.is_empty());
    assert_eq!(store.latest_date("equity:NEWCO").expect("latest"), None);
    cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("second read");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn when_a_refresh_fails_the_stale_window_is_served() {
    // Given: A store ten days behind and a dead provider
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let today = OffsetDateTime::now_utc().date();
    let seeded: Vec<PointRecord> = (0..5)
        .map(|i| PointRecord {
            date: today - Duration::days(14 - i),
            open: None,
            high: None,
            low: None,
            close: 75.0,
            volume: None,
        })
        .collect();
    store
        .upsert_points("equity:AAPL", "scripted", &seeded)
        .expect("seed");
    let provider = Arc::new(ScriptedProvider::failing());
    let cache = cache_over(store, provider.clone());
    let id = SeriesId::equity("AAPL").expect("valid id");

    // When
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("stale fallback");

    // Then: The refresh was attempted, then the stored window answered
    assert_eq!(provider.calls(), 1);
    assert_eq!(series.len(), 5);
    assert!(series.points.iter().all(|point| point.close == 75.0));
}

// =============================================================================
// Cache: Served Window
// =============================================================================

#[tokio::test]
async fn the_served_window_always_comes_from_the_store_not_the_response() {
    // Given: A provider whose response reaches further back than the window
    let temp = tempdir().expect("tempdir");
    let store = open_store(&temp);
    let provider = Arc::new(ScriptedProvider::returning(daily_records(60, 100.0)));
    let cache = cache_over(store.clone(), provider);
    let id = SeriesId::equity("AAPL").expect("valid id");

    // When: A one-month window is requested
    let series = cache
        .get_series(&id, FetchWindow::OneMonth)
        .await
        .expect("series");

    // Then: Everything was persisted but only the window is served
    let stored = store
        .read_series("equity:AAPL", None, None)
        .expect("read");
    assert_eq!(stored.len(), 60);
    assert!(series.len() <= 31);
    let today = OffsetDateTime::now_utc().date();
    let floor = today - Duration::days(FetchWindow::OneMonth.days());
    assert!(series.points.iter().all(|point| point.date >= floor));
}
