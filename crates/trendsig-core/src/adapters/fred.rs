use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use time::{Date, Duration, OffsetDateTime};

use crate::domain::{SeriesId, SeriesKind};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{
    FetchRange, HistoryRequest, MarketDataProvider, ProviderError, ProviderRecord,
};

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

/// Policy-rate adapter backed by the fredgraph CSV export.
///
/// The export is a two-column CSV of observation date and value; unpublished
/// days carry a "." placeholder and are skipped.
#[derive(Clone)]
pub struct FredAdapter {
    http_client: Arc<dyn HttpClient>,
    use_real_api: bool,
}

impl Default for FredAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            use_real_api: false,
        }
    }
}

impl FredAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
        }
    }

    fn check_kind(series: &SeriesId) -> Result<(), ProviderError> {
        match series.kind() {
            SeriesKind::PolicyRate => Ok(()),
            SeriesKind::Equity | SeriesKind::MacroIndex => Err(ProviderError::invalid_request(
                "rate source only serves policy-rate series",
            )),
        }
    }

    fn date_span(range: FetchRange) -> (Date, Date) {
        let today = OffsetDateTime::now_utc().date();
        match range {
            FetchRange::Window(window) => (today - Duration::days(window.days() - 1), today),
            FetchRange::Days(days) => (today - Duration::days(days - 1), today),
            FetchRange::Between { start, end } => (start, end),
        }
    }

    async fn fetch_real_history(
        &self,
        req: &HistoryRequest,
    ) -> Result<Vec<ProviderRecord>, ProviderError> {
        let (start, end) = Self::date_span(req.range);
        let endpoint = format!(
            "https://fred.stlouisfed.org/graph/fredgraph.csv?id={}&cosd={start}&coed={end}",
            urlencoding::encode(req.series.code())
        );

        let request = HttpRequest::get(endpoint).with_timeout_ms(10_000);
        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.retryable() {
                ProviderError::unavailable(format!("rate transport error: {}", error.message()))
            } else {
                ProviderError::internal(format!("rate transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            return Err(ProviderError::rate_limited("rate upstream throttled"));
        }
        if !response.is_success() {
            return Err(ProviderError::unavailable(format!(
                "rate upstream returned status {}",
                response.status
            )));
        }

        Self::parse_csv(&response.body)
    }

    fn parse_csv(body: &str) -> Result<Vec<ProviderRecord>, ProviderError> {
        let mut records = Vec::new();
        for line in body.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((date_str, value_str)) = line.split_once(',') else {
                return Err(ProviderError::internal(format!(
                    "malformed rate CSV row: {line}"
                )));
            };
            let value_str = value_str.trim();
            if value_str == "." {
                continue;
            }
            let date = Date::parse(date_str.trim(), DATE_FORMAT).map_err(|e| {
                ProviderError::internal(format!("bad date in rate CSV row {line}: {e}"))
            })?;
            let value: f64 = value_str.parse().map_err(|e| {
                ProviderError::internal(format!("bad value in rate CSV row {line}: {e}"))
            })?;
            records.push(ProviderRecord {
                ts: date.midnight().assume_utc(),
                open: None,
                high: None,
                low: None,
                close: value,
                volume: None,
            });
        }
        Ok(records)
    }

    fn fake_history(req: &HistoryRequest) -> Vec<ProviderRecord> {
        let (start, end) = Self::date_span(req.range);
        let days = (end - start).whole_days() + 1;
        let seed = req
            .series
            .code()
            .bytes()
            .fold(0_u64, |acc, byte| acc.wrapping_mul(31).wrapping_add(u64::from(byte)));
        let base = 2.0 + (seed % 5) as f64 * 0.5;

        let mut records = Vec::with_capacity(days.max(0) as usize);
        for i in 0..days.max(0) {
            let date = start + Duration::days(i);
            records.push(ProviderRecord {
                ts: date.midnight().assume_utc(),
                open: None,
                high: None,
                low: None,
                close: base + (i as f64) * 0.01,
                volume: None,
            });
        }
        records
    }
}

impl MarketDataProvider for FredAdapter {
    fn name(&self) -> &'static str {
        "fred"
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProviderRecord>, ProviderError>> + Send + 'a>>
    {
        Box::pin(async move {
            Self::check_kind(&req.series)?;
            if self.use_real_api {
                self.fetch_real_history(&req).await
            } else {
                Ok(Self::fake_history(&req))
            }
        })
    }
}
