//! # Trendsig Core
//!
//! Incremental caching and signal classification for daily financial time
//! series. The cache serves equity bars, macro index levels, and policy
//! rates from a local DuckDB store and only calls upstream providers for
//! the days the store is missing.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream source adapters (chart API, rate CSV export) |
//! | [`cache`] | Read-through series cache over store and provider |
//! | [`domain`] | Series identity, points, and fetch windows |
//! | [`error`] | Validation and classifier error types |
//! | [`http_client`] | Injectable HTTP transport |
//! | [`pacer`] | Minimum-interval pacing for provider calls |
//! | [`planner`] | Freshness policy and fetch planning |
//! | [`provider`] | Provider contract and kind-based routing |
//! | [`refresh`] | Concurrent batch refresh with signal-change tracking |
//! | [`signal`] | EMA crossover detection and classification |

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pacer;
pub mod planner;
pub mod provider;
pub mod refresh;
pub mod signal;

pub use adapters::{ChartAdapter, FredAdapter};
pub use cache::{CacheError, SeriesCache};
pub use domain::{FetchWindow, Series, SeriesId, SeriesKind, SeriesPoint};
pub use error::{SignalError, ValidationError};
pub use http_client::{HttpClient, NoopHttpClient, ReqwestHttpClient};
pub use pacer::ProviderPacer;
pub use planner::{plan_fetch, FetchPlan};
pub use provider::{
    FetchRange, HistoryRequest, MarketDataProvider, ProviderError, ProviderErrorKind,
    ProviderProfile, ProviderRecord, ProviderRouter,
};
pub use refresh::{RefreshReport, RefreshRunner, SignalChange};
pub use signal::{
    classify, detect_crossovers, ema, ClassificationResult, CrossDirection, Crossover,
    SignalStatus, FAST_SPAN, PROXIMITY_THRESHOLD_PCT, SLOW_SPAN,
};

pub use trendsig_store::{
    InstrumentProfile, PointRecord, SeriesStore, SignalState, StoreConfig, StoreError,
};
