use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::ValidationError;

const MAX_CODE_LEN: usize = 15;

/// The kind of series a cache entry describes.
///
/// The kind selects the provider route and the freshness policy applied to
/// the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Equity,
    MacroIndex,
    PolicyRate,
}

impl SeriesKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::MacroIndex => "macro",
            Self::PolicyRate => "rate",
        }
    }
}

impl Display for SeriesKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equity" => Ok(Self::Equity),
            "macro" => Ok(Self::MacroIndex),
            "rate" => Ok(Self::PolicyRate),
            other => Err(ValidationError::InvalidSeriesKind {
                value: other.to_owned(),
            }),
        }
    }
}

/// Identity of a cached series: a kind plus a normalized provider code.
///
/// The canonical string form (`equity:AAPL`, `macro:^VIX`, `rate:DFF`) is
/// the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeriesId {
    kind: SeriesKind,
    code: String,
}

impl SeriesId {
    /// Validate and normalize a code for the given kind.
    pub fn new(kind: SeriesKind, code: &str) -> Result<Self, ValidationError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCode);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_CODE_LEN {
            return Err(ValidationError::CodeTooLong {
                len,
                max: MAX_CODE_LEN,
            });
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphabetic() && first != '^' {
                return Err(ValidationError::CodeInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '^';
            if !valid {
                return Err(ValidationError::CodeInvalidChar { ch, index });
            }
        }

        Ok(Self {
            kind,
            code: normalized,
        })
    }

    pub fn equity(code: &str) -> Result<Self, ValidationError> {
        Self::new(SeriesKind::Equity, code)
    }

    pub fn macro_index(code: &str) -> Result<Self, ValidationError> {
        Self::new(SeriesKind::MacroIndex, code)
    }

    pub fn policy_rate(code: &str) -> Result<Self, ValidationError> {
        Self::new(SeriesKind::PolicyRate, code)
    }

    pub const fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Canonical storage key, e.g. `equity:AAPL`.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.code)
    }
}

impl Display for SeriesId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.code)
    }
}

impl FromStr for SeriesId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, code) = value
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidSeriesId {
                value: value.to_owned(),
            })?;
        Self::new(SeriesKind::from_str(kind)?, code)
    }
}

impl TryFrom<String> for SeriesId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<SeriesId> for String {
    fn from(value: SeriesId) -> Self {
        value.storage_key()
    }
}

/// One daily observation of a series.
///
/// Equity bars carry all OHLCV fields; scalar series (index levels, policy
/// rates) carry only `close`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: Date,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

impl SeriesPoint {
    /// Validate a point: finite non-negative values, OHLC bounds consistent
    /// when present.
    pub fn new(
        date: Date,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_value("close", close)?;
        validate_optional("open", open)?;
        validate_optional("high", high)?;
        validate_optional("low", low)?;

        if let (Some(high), Some(low)) = (high, low) {
            if high < low {
                return Err(ValidationError::InvalidPointRange);
            }
            if close < low || close > high {
                return Err(ValidationError::InvalidPointBounds);
            }
            if let Some(open) = open {
                if open < low || open > high {
                    return Err(ValidationError::InvalidPointBounds);
                }
            }
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// A scalar observation with only a closing value.
    pub fn scalar(date: Date, close: f64) -> Result<Self, ValidationError> {
        Self::new(date, None, None, None, close, None)
    }
}

fn validate_value(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(value) => validate_value(field, value),
        None => Ok(()),
    }
}

/// An ordered slice of a series as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(id: SeriesId, points: Vec<SeriesPoint>) -> Self {
        Self { id, points }
    }

    pub fn empty(id: SeriesId) -> Self {
        Self {
            id,
            points: Vec::new(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.close).collect()
    }

    pub fn latest_date(&self) -> Option<Date> {
        self.points.last().map(|point| point.date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn normalizes_series_id_and_formats_storage_key() {
        let id = SeriesId::equity(" aapl ").expect("id should parse");
        assert_eq!(id.code(), "AAPL");
        assert_eq!(id.storage_key(), "equity:AAPL");
    }

    #[test]
    fn accepts_caret_prefixed_index_codes() {
        let id = SeriesId::macro_index("^vix").expect("id should parse");
        assert_eq!(id.storage_key(), "macro:^VIX");
    }

    #[test]
    fn rejects_invalid_start_character() {
        let err = SeriesId::equity("1AAPL").expect_err("must fail");
        assert!(matches!(err, ValidationError::CodeInvalidStart { .. }));
    }

    #[test]
    fn parses_storage_key_back_into_id() {
        let id: SeriesId = "rate:DFF".parse().expect("must parse");
        assert_eq!(id.kind(), SeriesKind::PolicyRate);
        assert_eq!(id.code(), "DFF");
    }

    #[test]
    fn rejects_key_without_kind_prefix() {
        let err = "AAPL".parse::<SeriesId>().expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidSeriesId { .. }));
    }

    #[test]
    fn rejects_close_outside_high_low_range() {
        let err = SeriesPoint::new(
            date!(2026 - 08 - 20),
            Some(100.0),
            Some(101.0),
            Some(99.0),
            103.0,
            None,
        )
        .expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidPointBounds);
    }

    #[test]
    fn rejects_non_finite_close() {
        let err = SeriesPoint::scalar(date!(2026 - 08 - 20), f64::NAN).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }
}
