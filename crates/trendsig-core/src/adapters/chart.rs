use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::domain::{SeriesId, SeriesKind};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{
    FetchRange, HistoryRequest, MarketDataProvider, ProviderError, ProviderProfile,
    ProviderRecord,
};

/// Chart-endpoint adapter for equity and macro-index series.
///
/// Real mode talks to the v8 chart API (one candle row per trading day,
/// null rows on holidays) and the v10 summary API for instrument metadata.
/// With a mock transport it produces deterministic fixture bars instead.
#[derive(Clone)]
pub struct ChartAdapter {
    http_client: Arc<dyn HttpClient>,
    use_real_api: bool,
}

impl Default for ChartAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            use_real_api: false,
        }
    }
}

impl ChartAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
        }
    }

    fn check_kind(series: &SeriesId) -> Result<(), ProviderError> {
        match series.kind() {
            SeriesKind::Equity | SeriesKind::MacroIndex => Ok(()),
            SeriesKind::PolicyRate => Err(ProviderError::invalid_request(
                "chart source does not serve policy-rate series",
            )),
        }
    }

    fn history_endpoint(series: &SeriesId, range: FetchRange) -> String {
        let base = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?interval=1d",
            urlencoding::encode(series.code())
        );
        match range {
            FetchRange::Window(window) => format!("{base}&range={}", window.as_str()),
            FetchRange::Days(days) => {
                let now = OffsetDateTime::now_utc();
                let start = now - Duration::days(days);
                format!(
                    "{base}&period1={}&period2={}",
                    start.unix_timestamp(),
                    now.unix_timestamp()
                )
            }
            FetchRange::Between { start, end } => {
                let period1 = start.midnight().assume_utc().unix_timestamp();
                let period2 = (end + Duration::days(1)).midnight().assume_utc().unix_timestamp();
                format!("{base}&period1={period1}&period2={period2}")
            }
        }
    }

    async fn fetch_real_history(
        &self,
        req: &HistoryRequest,
    ) -> Result<Vec<ProviderRecord>, ProviderError> {
        let endpoint = Self::history_endpoint(&req.series, req.range);
        let body = self.execute(&endpoint).await?;

        let response: ChartResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::internal(format!("failed to parse chart response: {e}")))?;

        if let Some(error) = &response.chart.error {
            if !error.is_null() {
                return Err(ProviderError::unavailable(format!(
                    "chart API error: {error}"
                )));
            }
        }

        let Some(result) = response.chart.result.first() else {
            return Ok(Vec::new());
        };
        let Some(timestamps) = result.timestamp.as_ref() else {
            // No timestamps means the symbol has no data in the range.
            return Ok(Vec::new());
        };
        let quote = result
            .indicators
            .quote
            .first()
            .ok_or_else(|| ProviderError::internal("no quote track in chart response"))?;

        // The chart API reports timestamps in UTC plus the exchange offset;
        // applying the offset makes `.date()` the exchange-local trading day.
        let offset = result
            .meta
            .as_ref()
            .and_then(|meta| meta.gmtoffset)
            .and_then(|seconds| UtcOffset::from_whole_seconds(seconds).ok())
            .unwrap_or(UtcOffset::UTC);

        let mut records = Vec::with_capacity(timestamps.len());
        for (i, &unix) in timestamps.iter().enumerate() {
            let Ok(ts) = OffsetDateTime::from_unix_timestamp(unix) else {
                continue;
            };
            // Holiday rows arrive as nulls; a missing close drops the row.
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            records.push(ProviderRecord {
                ts: ts.to_offset(offset),
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close,
                volume: quote
                    .volume
                    .get(i)
                    .copied()
                    .flatten()
                    .and_then(|v| u64::try_from(v).ok()),
            });
        }

        Ok(records)
    }

    async fn fetch_real_profile(
        &self,
        series: &SeriesId,
    ) -> Result<ProviderProfile, ProviderError> {
        let endpoint = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules=price,assetProfile",
            urlencoding::encode(series.code())
        );
        let body = self.execute(&endpoint).await?;

        let response: SummaryResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::internal(format!("failed to parse summary response: {e}"))
        })?;

        let result = response
            .quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::unavailable("no summary data for symbol"))?;

        let name = result
            .price
            .and_then(|price| price.long_name.or(price.short_name))
            .unwrap_or_else(|| series.code().to_owned());
        let summary = result
            .asset_profile
            .and_then(|profile| profile.long_business_summary);

        Ok(ProviderProfile { name, summary })
    }

    async fn execute(&self, endpoint: &str) -> Result<String, ProviderError> {
        let request = HttpRequest::get(endpoint)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);

        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.retryable() {
                ProviderError::unavailable(format!("chart transport error: {}", error.message()))
            } else {
                ProviderError::internal(format!("chart transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            return Err(ProviderError::rate_limited("chart upstream throttled"));
        }
        if !response.is_success() {
            return Err(ProviderError::unavailable(format!(
                "chart upstream returned status {}",
                response.status
            )));
        }

        Ok(response.body)
    }

    fn fake_history(req: &HistoryRequest) -> Vec<ProviderRecord> {
        let (start, days) = match req.range {
            FetchRange::Window(window) => {
                let today = OffsetDateTime::now_utc().date();
                (today - Duration::days(window.days() - 1), window.days())
            }
            FetchRange::Days(days) => {
                let today = OffsetDateTime::now_utc().date();
                (today - Duration::days(days - 1), days)
            }
            FetchRange::Between { start, end } => (start, (end - start).whole_days() + 1),
        };

        let seed = code_seed(req.series.code());
        let base = 80.0 + (seed % 40) as f64;
        let mut records = Vec::with_capacity(days.max(0) as usize);
        for i in 0..days.max(0) {
            let date = start + Duration::days(i);
            let close = base + (i as f64) * 0.3;
            records.push(ProviderRecord {
                ts: date.midnight().assume_utc(),
                open: Some(close - 0.4),
                high: Some(close + 0.9),
                low: Some(close - 1.1),
                close,
                volume: Some(25_000 + (i as u64) * 40),
            });
        }
        records
    }

    fn fake_profile(series: &SeriesId) -> ProviderProfile {
        ProviderProfile {
            name: format!("{} Incorporated", series.code()),
            summary: Some(format!(
                "Deterministic fixture profile for {}.",
                series.code()
            )),
        }
    }
}

impl MarketDataProvider for ChartAdapter {
    fn name(&self) -> &'static str {
        "chart"
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

    fn profile<'a>(
        &'a self,
        series: SeriesId,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderProfile, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            Self::check_kind(&series)?;
            if self.use_real_api {
                self.fetch_real_profile(&series).await
            } else {
                Ok(Self::fake_profile(&series))
            }
        })
    }
}

fn code_seed(code: &str) -> u64 {
    code.bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

// Chart API response structures.
#[derive(Debug, Clone, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Vec<ChartResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

// Summary API response structures.
#[derive(Debug, Clone, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryData,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryData {
    #[serde(default)]
    result: Vec<SummaryResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryResult {
    #[serde(default)]
    price: Option<SummaryPrice>,
    #[serde(rename = "assetProfile", default)]
    asset_profile: Option<SummaryAssetProfile>,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryPrice {
    #[serde(rename = "longName", default)]
    long_name: Option<String>,
    #[serde(rename = "shortName", default)]
    short_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryAssetProfile {
    #[serde(rename = "longBusinessSummary", default)]
    long_business_summary: Option<String>,
}
