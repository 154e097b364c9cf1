//! Batch refresh across a set of series.
//!
//! Classifies every series concurrently (bounded by a job limit), compares
//! each latest crossover against the recorded signal state, and reports
//! which series produced a signal not seen before.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheError, SeriesCache};
use crate::domain::{FetchWindow, SeriesId};
use crate::signal::{Crossover, SignalStatus};
use trendsig_store::SignalState;

/// A crossover not present in the recorded state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalChange {
    pub id: SeriesId,
    pub crossover: Crossover,
    pub status: SignalStatus,
}

/// Outcome summary of one refresh run.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Series whose latest crossover differs from the recorded state.
    pub new_signals: Vec<SignalChange>,
    /// Series whose latest crossover was already recorded.
    pub unchanged: usize,
    /// Series with no crossover in the window.
    pub no_signal: usize,
    /// Series that failed, with the error message.
    pub errors: Vec<(SeriesId, String)>,
}

impl RefreshReport {
    pub fn total(&self) -> usize {
        self.new_signals.len() + self.unchanged + self.no_signal + self.errors.len()
    }
}

enum Outcome {
    New(SignalChange),
    Unchanged,
    NoSignal,
}

/// Runs refreshes with bounded concurrency over a shared cache.
pub struct RefreshRunner {
    cache: Arc<SeriesCache>,
    jobs: usize,
}

impl RefreshRunner {
    pub fn new(cache: Arc<SeriesCache>, jobs: usize) -> Self {
        Self {
            cache,
            jobs: jobs.max(1),
        }
    }

    /// Refresh every series and collect the outcomes.
    ///
    /// Per-series failures land in the report; they never abort the run.
    pub async fn run(&self, series: Vec<SeriesId>, window: FetchWindow) -> RefreshReport {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut tasks = JoinSet::new();

        for id in series {
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let outcome = refresh_one(&cache, &id, window).await;
                (id, outcome)
            });
        }

        let mut report = RefreshReport::default();
        while let Some(joined) = tasks.join_next().await {
            let Ok((id, outcome)) = joined else {
                continue;
            };
            match outcome {
                Ok(Outcome::New(change)) => report.new_signals.push(change),
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::NoSignal) => report.no_signal += 1,
                Err(error) => report.errors.push((id, error.to_string())),
            }
        }

        // Newest signals first.
        report
            .new_signals
            .sort_by(|a, b| b.crossover.date.cmp(&a.crossover.date));
        report
    }
}

async fn refresh_one(
    cache: &SeriesCache,
    id: &SeriesId,
    window: FetchWindow,
) -> Result<Outcome, CacheError> {
    let result = cache.classify_series(id, window).await?;

    let Some(crossover) = result.last_crossover else {
        return Ok(Outcome::NoSignal);
    };

    let key = id.storage_key();
    let recorded = cache.store().signal_state(&key)?;
    // Only the date decides novelty; a direction flip on the same date is
    // not reported as a change.
    let already_seen = recorded.is_some_and(|state| state.last_signal_date == crossover.date);

    // Always rewrite the state so last_checked advances.
    cache.store().record_signal_state(&SignalState {
        series_id: key,
        last_signal_date: crossover.date,
        last_signal_direction: crossover.direction.as_str().to_owned(),
    })?;

    if already_seen {
        Ok(Outcome::Unchanged)
    } else {
        Ok(Outcome::New(SignalChange {
            id: id.clone(),
            crossover,
            status: result.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacer::ProviderPacer;
    use crate::provider::{
        HistoryRequest, MarketDataProvider, ProviderError, ProviderRecord,
    };
    use std::future::Future;
    use std::pin::Pin;
    use tempfile::tempdir;
    use time::{Duration, OffsetDateTime};
    use trendsig_store::{SeriesStore, StoreConfig};

    /// Serves a decline-then-jump shape that always carries a golden cross.
    struct CrossingProvider;

    impl MarketDataProvider for CrossingProvider {
        fn name(&self) -> &'static str {
            "crossing"
        }

        fn history<'a>(
            &'a self,
            _req: HistoryRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>
        {
            let today = OffsetDateTime::now_utc().date();
            let mut closes: Vec<f64> = (0..25).map(|i| 102.0 - 0.16 * f64::from(i)).collect();
            closes.push(150.0);
            let len = closes.len() as i64;
            let records = closes
                .into_iter()
                .enumerate()
                .map(|(i, close)| ProviderRecord {
                    ts: (today - Duration::days(len - 1 - i as i64))
                        .midnight()
                        .assume_utc(),
                    open: None,
                    high: None,
                    low: None,
                    close,
                    volume: None,
                })
                .collect();
            Box::pin(async move { Ok(records) })
        }
    }

    fn runner(dir: &tempfile::TempDir) -> RefreshRunner {
        let store = Arc::new(
            SeriesStore::open(StoreConfig {
                trendsig_home: dir.path().to_path_buf(),
                db_path: dir.path().join("series.duckdb"),
                max_pool_size: 2,
            })
            .expect("store open"),
        );
        let cache = Arc::new(SeriesCache::new(
            store,
            Arc::new(CrossingProvider),
            ProviderPacer::from_millis(0),
        ));
        RefreshRunner::new(cache, 4)
    }

    #[tokio::test]
    async fn first_run_reports_new_signal_second_run_unchanged() {
        let temp = tempdir().expect("tempdir");
        let runner = runner(&temp);
        let series = vec![SeriesId::equity("AAPL").expect("valid id")];

        let first = runner.run(series.clone(), FetchWindow::OneMonth).await;
        assert_eq!(first.new_signals.len(), 1);
        assert_eq!(first.unchanged, 0);

        let second = runner.run(series, FetchWindow::OneMonth).await;
        assert!(second.new_signals.is_empty());
        assert_eq!(second.unchanged, 1);
    }

    struct OfflineProvider;

    impl MarketDataProvider for OfflineProvider {
        fn name(&self) -> &'static str {
            "offline"
        }

        fn history<'a>(
            &'a self,
            _req: HistoryRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>
        {
            Box::pin(async move { Err(ProviderError::unavailable("offline")) })
        }
    }

    #[tokio::test]
    async fn empty_series_lands_in_errors_without_aborting_the_run() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(
            SeriesStore::open(StoreConfig {
                trendsig_home: temp.path().to_path_buf(),
                db_path: temp.path().join("series.duckdb"),
                max_pool_size: 2,
            })
            .expect("store open"),
        );
        let cache = Arc::new(SeriesCache::new(
            store,
            Arc::new(OfflineProvider),
            ProviderPacer::from_millis(0),
        ));
        let runner = RefreshRunner::new(cache, 4);

        // With the provider down and nothing stored, every series reads back
        // empty and the classifier rejects it.
        let series = vec![
            SeriesId::equity("AAPL").expect("valid id"),
            SeriesId::equity("MSFT").expect("valid id"),
        ];
        let report = runner.run(series, FetchWindow::OneMonth).await;
        assert_eq!(report.total(), 2);
        assert_eq!(report.errors.len(), 2);
        assert!(report.new_signals.is_empty());
    }
}
