//! Provider contract and request/response types.
//!
//! All upstream market-data sources implement [`MarketDataProvider`]; the
//! cache service only ever talks to this trait. Adapters normalize their
//! wire formats into [`ProviderRecord`] values and leave calendar-day
//! bucketing to the caller.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use time::{Date, OffsetDateTime};

use crate::domain::{FetchWindow, SeriesId, SeriesKind};

/// How far back a history request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRange {
    /// A named lookback window ending today.
    Window(FetchWindow),
    /// The last `n` days ending today.
    Days(i64),
    /// An explicit inclusive date range.
    Between { start: Date, end: Date },
}

/// Request for the daily history of one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub series: SeriesId,
    pub range: FetchRange,
}

impl HistoryRequest {
    pub fn new(series: SeriesId, range: FetchRange) -> Result<Self, ProviderError> {
        match range {
            FetchRange::Days(days) if days <= 0 => Err(ProviderError::invalid_request(
                "history request span must be at least one day",
            )),
            FetchRange::Between { start, end } if start > end => Err(
                ProviderError::invalid_request("history request start must not be after end"),
            ),
            _ => Ok(Self { series, range }),
        }
    }
}

/// One raw observation from a provider.
///
/// `ts` keeps the provider's own zone offset; consumers take the wall-clock
/// calendar day from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderRecord {
    pub ts: OffsetDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Cached instrument metadata as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: String,
    pub summary: Option<String>,
}

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Unsupported,
    Internal,
}

/// Structured provider error used for stale-fallback decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::Unsupported => "provider.unsupported",
            ProviderErrorKind::Internal => "provider.internal",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// Upstream source contract.
///
/// Implementations must be `Send + Sync`; the cache shares one instance
/// across concurrent refresh workers.
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in logs and the stored `source` column.
    fn name(&self) -> &'static str;

    /// Fetch daily history for one series.
    ///
    /// An empty vector is a valid response (unknown symbol, market holiday
    /// span); it is not an error.
    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>;

    /// Fetch instrument metadata for one series.
    ///
    /// Sources without a metadata endpoint keep the default.
    fn profile<'a>(
        &'a self,
        series: SeriesId,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderProfile, ProviderError>> + Send + 'a>> {
        let _ = series;
        Box::pin(async move {
            Err(ProviderError::unsupported(
                "this source has no instrument metadata endpoint",
            ))
        })
    }
}

/// Routes requests to a source by series kind.
///
/// Equity and macro-index series share the chart source; policy rates go to
/// the rate source.
pub struct ProviderRouter {
    chart: Arc<dyn MarketDataProvider>,
    rates: Arc<dyn MarketDataProvider>,
}

impl ProviderRouter {
    pub fn new(chart: Arc<dyn MarketDataProvider>, rates: Arc<dyn MarketDataProvider>) -> Self {
        Self { chart, rates }
    }

    fn route(&self, kind: SeriesKind) -> &Arc<dyn MarketDataProvider> {
        match kind {
            SeriesKind::Equity | SeriesKind::MacroIndex => &self.chart,
            SeriesKind::PolicyRate => &self.rates,
        }
    }
}

impl MarketDataProvider for ProviderRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>
    {
        self.route(req.series.kind()).history(req)
    }

    fn profile<'a>(
        &'a self,
        series: SeriesId,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderProfile, ProviderError>> + Send + 'a>> {
        self.route(series.kind()).profile(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn rejects_non_positive_day_span() {
        let id = SeriesId::equity("AAPL").expect("valid id");
        let err = HistoryRequest::new(id, FetchRange::Days(0)).expect_err("must fail");
        assert_eq!(err.kind(), ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn rejects_inverted_date_range() {
        let id = SeriesId::policy_rate("DFF").expect("valid id");
        let err = HistoryRequest::new(
            id,
            FetchRange::Between {
                start: date!(2026 - 08 - 24),
                end: date!(2026 - 08 - 20),
            },
        )
        .expect_err("must fail");
        assert_eq!(err.kind(), ProviderErrorKind::InvalidRequest);
    }
}
