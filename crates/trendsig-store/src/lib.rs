//! # Trendsig Store
//!
//! DuckDB-based persistence for trendsig time series.
//!
//! One table holds every series kind: equity OHLCV bars, macro index levels,
//! and policy rates all key on `(series_id, date)`, with scalar series using
//! only the `close` column. Auxiliary tables track signal-change state and a
//! small instrument-profile cache.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `series_data` | Daily points keyed by `(series_id, date)` |
//! | `signal_state` | Last known crossover per series |
//! | `instrument_profiles` | Cached instrument name/summary |
//!
//! All user-provided values are passed as query parameters, never
//! interpolated into SQL text.

pub mod migrations;
pub mod pool;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::ToSql;
use thiserror::Error;
use time::macros::format_description;
use time::Date;

pub use pool::{ConnectionPool, PooledConnection};

/// Number of days a cached instrument profile stays usable.
pub const PROFILE_TTL_DAYS: i64 = 30;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded into a domain type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Configuration for the series store database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for trendsig data.
    pub trendsig_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let trendsig_home = resolve_trendsig_home();
        let db_path = trendsig_home.join("cache").join("series.duckdb");
        Self {
            trendsig_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at an explicit database file path.
    #[must_use]
    pub fn at_db_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let trendsig_home = db_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            trendsig_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// A single daily point to persist or read back.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub date: Date,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Last known crossover for a series, written by the refresh runner.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalState {
    pub series_id: String,
    pub last_signal_date: Date,
    pub last_signal_direction: String,
}

/// Cached instrument metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentProfile {
    pub series_id: String,
    pub name: String,
    pub summary: Option<String>,
    pub updated_at: Date,
}

impl InstrumentProfile {
    /// Whether the cached profile is still within its TTL as of `today`.
    #[must_use]
    pub fn is_fresh(&self, today: Date) -> bool {
        (today - self.updated_at).whole_days() < PROFILE_TTL_DAYS
    }
}

/// The series store interface.
#[derive(Clone)]
pub struct SeriesStore {
    pool: ConnectionPool,
}

impl SeriesStore {
    /// Open a store with default configuration.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Open a store with the given configuration, applying migrations.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Insert-or-replace a batch of points for one series.
    ///
    /// The batch is written inside a single transaction; either every row
    /// lands or none do. An empty batch is a no-op.
    pub fn upsert_points(
        &self,
        series_id: &str,
        source: &str,
        rows: &[PointRecord],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), StoreError> {
            for row in rows {
                let date = date_to_sql(row.date);
                let volume = row.volume.map(i64_volume).transpose()?;
                let params: [&dyn ToSql; 8] = [
                    &series_id,
                    &date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &volume,
                    &source,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO series_data \
                     (series_id, date, open, high, low, close, volume, source, updated_at) \
                     VALUES (?, TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Read points for a series ordered by date ascending.
    ///
    /// `from` and `to` bound the window inclusively when present. An unknown
    /// series yields an empty vector.
    pub fn read_series(
        &self,
        series_id: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Vec<PointRecord>, StoreError> {
        let connection = self.pool.acquire()?;

        let mut sql = String::from(
            "SELECT CAST(date AS VARCHAR), open, high, low, close, volume \
             FROM series_data WHERE series_id = ?",
        );
        let from = from.map(date_to_sql);
        let to = to.map(date_to_sql);
        let mut params: Vec<&dyn ToSql> = vec![&series_id];
        if let Some(from) = from.as_ref() {
            sql.push_str(" AND date >= TRY_CAST(? AS DATE)");
            params.push(from);
        }
        if let Some(to) = to.as_ref() {
            sql.push_str(" AND date <= TRY_CAST(? AS DATE)");
            params.push(to);
        }
        sql.push_str(" ORDER BY date ASC");

        let mut statement = connection.prepare(sql.as_str())?;
        let mut cursor = statement.query(params.as_slice())?;
        let mut points = Vec::new();
        while let Some(row) = cursor.next()? {
            let date: String = row.get(0)?;
            let volume: Option<i64> = row.get(5)?;
            points.push(PointRecord {
                date: date_from_sql(&date)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: volume.map(u64_volume).transpose()?,
            });
        }

        Ok(points)
    }

    /// Most recent stored date for a series, `None` when the series is empty.
    pub fn latest_date(&self, series_id: &str) -> Result<Option<Date>, StoreError> {
        let connection = self.pool.acquire()?;
        let params: [&dyn ToSql; 1] = [&series_id];
        let latest: Option<String> = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM series_data WHERE series_id = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        latest.map(|value| date_from_sql(&value)).transpose()
    }

    /// Read the last recorded signal state for a series.
    pub fn signal_state(&self, series_id: &str) -> Result<Option<SignalState>, StoreError> {
        let connection = self.pool.acquire()?;
        let params: [&dyn ToSql; 1] = [&series_id];
        let mut statement = connection.prepare(
            "SELECT CAST(last_signal_date AS VARCHAR), last_signal_direction \
             FROM signal_state WHERE series_id = ?",
        )?;
        let mut cursor = statement.query(params.as_slice())?;
        let Some(row) = cursor.next()? else {
            return Ok(None);
        };
        let date: String = row.get(0)?;
        Ok(Some(SignalState {
            series_id: series_id.to_owned(),
            last_signal_date: date_from_sql(&date)?,
            last_signal_direction: row.get(1)?,
        }))
    }

    /// Insert-or-replace the signal state for a series, stamping
    /// `last_checked` with the database clock.
    pub fn record_signal_state(&self, state: &SignalState) -> Result<(), StoreError> {
        let connection = self.pool.acquire()?;
        let date = date_to_sql(state.last_signal_date);
        let params: [&dyn ToSql; 3] = [&state.series_id, &date, &state.last_signal_direction];
        connection.execute(
            "INSERT OR REPLACE INTO signal_state \
             (series_id, last_signal_date, last_signal_direction, last_checked) \
             VALUES (?, TRY_CAST(? AS DATE), ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Read a cached instrument profile regardless of freshness.
    pub fn profile(&self, series_id: &str) -> Result<Option<InstrumentProfile>, StoreError> {
        let connection = self.pool.acquire()?;
        let params: [&dyn ToSql; 1] = [&series_id];
        let mut statement = connection.prepare(
            "SELECT name, summary, CAST(updated_at AS VARCHAR) \
             FROM instrument_profiles WHERE series_id = ?",
        )?;
        let mut cursor = statement.query(params.as_slice())?;
        let Some(row) = cursor.next()? else {
            return Ok(None);
        };
        let updated_at: String = row.get(2)?;
        Ok(Some(InstrumentProfile {
            series_id: series_id.to_owned(),
            name: row.get(0)?,
            summary: row.get(1)?,
            updated_at: date_from_sql(&updated_at)?,
        }))
    }

    /// Insert-or-replace a cached instrument profile.
    pub fn record_profile(&self, profile: &InstrumentProfile) -> Result<(), StoreError> {
        let connection = self.pool.acquire()?;
        let updated_at = date_to_sql(profile.updated_at);
        let params: [&dyn ToSql; 4] = [
            &profile.series_id,
            &profile.name,
            &profile.summary,
            &updated_at,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO instrument_profiles \
             (series_id, name, summary, updated_at) \
             VALUES (?, ?, ?, TRY_CAST(? AS DATE))",
            params.as_slice(),
        )?;
        Ok(())
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &::duckdb::Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

fn date_to_sql(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| format!("{date}"))
}

fn date_from_sql(value: &str) -> Result<Date, StoreError> {
    Date::parse(value, DATE_FORMAT)
        .map_err(|error| StoreError::Corrupt(format!("invalid stored date '{value}': {error}")))
}

fn i64_volume(volume: u64) -> Result<i64, StoreError> {
    i64::try_from(volume)
        .map_err(|_| StoreError::Corrupt(format!("volume {volume} exceeds storable range")))
}

fn u64_volume(volume: i64) -> Result<u64, StoreError> {
    u64::try_from(volume)
        .map_err(|_| StoreError::Corrupt(format!("negative stored volume {volume}")))
}

/// Resolve the trendsig home directory from environment or default.
fn resolve_trendsig_home() -> PathBuf {
    if let Some(path) = env::var_os("TRENDSIG_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".trendsig");
    }

    PathBuf::from(".trendsig")
}
