//! Read-through series cache.
//!
//! Every read goes store-first: the planner decides whether the stored
//! high-water mark is fresh enough, and only stale or unknown series cost a
//! provider call. Fetched records are normalized to calendar days, merged
//! into the store transactionally, and the requested window is then served
//! from the store. The provider response is never returned directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::domain::{FetchWindow, Series, SeriesId, SeriesKind, SeriesPoint};
use crate::error::{SignalError, ValidationError};
use crate::pacer::ProviderPacer;
use crate::planner::{plan_fetch, FetchPlan};
use crate::provider::{
    FetchRange, HistoryRequest, MarketDataProvider, ProviderError, ProviderProfile,
};
use crate::signal::{classify, ClassificationResult};
use trendsig_store::{InstrumentProfile, PointRecord, SeriesStore};

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] trendsig_store::StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// The read-through cache over one store and one provider.
pub struct SeriesCache {
    store: Arc<SeriesStore>,
    provider: Arc<dyn MarketDataProvider>,
    pacer: ProviderPacer,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SeriesCache {
    pub fn new(
        store: Arc<SeriesStore>,
        provider: Arc<dyn MarketDataProvider>,
        pacer: ProviderPacer,
    ) -> Self {
        Self {
            store,
            provider,
            pacer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    /// Serve the requested window of a series, refreshing the store first
    /// when the planner finds it stale.
    ///
    /// Provider failures on an incremental refresh fall back to the stale
    /// stored window. A failed or empty first fetch yields an empty series;
    /// nothing is committed, so the next request replans from scratch.
    pub async fn get_series(
        &self,
        id: &SeriesId,
        window: FetchWindow,
    ) -> Result<Series, CacheError> {
        let key = id.storage_key();
        let lock = self.series_lock(&key).await;
        let _guard = lock.lock().await;

        let today = OffsetDateTime::now_utc().date();
        let latest = self.store.latest_date(&key)?;

        match plan_fetch(id.kind(), latest, window, today) {
            FetchPlan::Skip => {}
            FetchPlan::Full { window } => {
                let req = HistoryRequest::new(id.clone(), FetchRange::Window(window))?;
                self.pacer.pace().await;
                match self.provider.history(req).await {
                    Ok(records) => {
                        let rows = normalize(records, None);
                        self.store
                            .upsert_points(&key, self.provider.name(), &rows)?;
                    }
                    Err(_) => return Ok(Series::empty(id.clone())),
                }
            }
            FetchPlan::Incremental { since, span_days } => {
                let range = incremental_range(id.kind(), since, span_days, today);
                let req = HistoryRequest::new(id.clone(), range)?;
                self.pacer.pace().await;
                // A failed refresh serves the stale stored window instead.
                if let Ok(records) = self.provider.history(req).await {
                    let rows = normalize(records, Some(since));
                    self.store
                        .upsert_points(&key, self.provider.name(), &rows)?;
                }
            }
        }

        self.read_window(id, &key, window, today)
    }

    /// Classify the series over the requested window.
    pub async fn classify_series(
        &self,
        id: &SeriesId,
        window: FetchWindow,
    ) -> Result<ClassificationResult, CacheError> {
        let series = self.get_series(id, window).await?;
        Ok(classify(&series)?)
    }

    /// Instrument metadata with a 30-day store cache.
    ///
    /// A fresh cached profile short-circuits the provider. When the provider
    /// fails and a stale profile exists, the stale profile is served.
    pub async fn profile(&self, id: &SeriesId) -> Result<InstrumentProfile, CacheError> {
        let key = id.storage_key();
        let today = OffsetDateTime::now_utc().date();

        let cached = self.store.profile(&key)?;
        if let Some(profile) = &cached {
            if profile.is_fresh(today) {
                return Ok(profile.clone());
            }
        }

        self.pacer.pace().await;
        match self.provider.profile(id.clone()).await {
            Ok(fetched) => {
                let profile = profile_record(&key, fetched, today);
                self.store.record_profile(&profile)?;
                Ok(profile)
            }
            Err(error) => cached.ok_or(CacheError::Provider(error)),
        }
    }

    async fn series_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_owned()).or_default().clone()
    }

    fn read_window(
        &self,
        id: &SeriesId,
        key: &str,
        window: FetchWindow,
        today: Date,
    ) -> Result<Series, CacheError> {
        let from = today - Duration::days(window.days());
        let rows = self.store.read_series(key, Some(from), None)?;
        let points = rows
            .into_iter()
            .map(|row| SeriesPoint {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            })
            .collect();
        Ok(Series::new(id.clone(), points))
    }
}

/// Range for an incremental fetch.
///
/// The chart source takes a trailing-days span; the rate source takes the
/// explicit gap dates.
fn incremental_range(kind: SeriesKind, since: Date, span_days: i64, today: Date) -> FetchRange {
    match kind {
        SeriesKind::Equity | SeriesKind::MacroIndex => FetchRange::Days(span_days),
        SeriesKind::PolicyRate => FetchRange::Between {
            start: since,
            end: today,
        },
    }
}

/// Bucket raw provider records into one validated row per calendar day.
///
/// The wall-clock date of each timestamp is the bucket key; when a day
/// appears more than once the last record wins. Rows that fail point
/// validation are dropped, as are rows at or before `floor`.
fn normalize(records: Vec<crate::provider::ProviderRecord>, floor: Option<Date>) -> Vec<PointRecord> {
    let mut by_day: BTreeMap<Date, PointRecord> = BTreeMap::new();
    for record in records {
        let date = record.ts.date();
        if let Some(floor) = floor {
            if date <= floor {
                continue;
            }
        }
        let valid = SeriesPoint::new(
            date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        );
        if let Ok(point) = valid {
            by_day.insert(
                date,
                PointRecord {
                    date,
                    open: point.open,
                    high: point.high,
                    low: point.low,
                    close: point.close,
                    volume: point.volume,
                },
            );
        }
    }
    by_day.into_values().collect()
}

fn profile_record(key: &str, fetched: ProviderProfile, today: Date) -> InstrumentProfile {
    InstrumentProfile {
        series_id: key.to_owned(),
        name: fetched.name,
        summary: fetched.summary,
        updated_at: today,
    }
}
