use thiserror::Error;

/// Validation errors for domain types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("series code cannot be empty")]
    EmptyCode,
    #[error("series code length {len} exceeds max {max}")]
    CodeTooLong { len: usize, max: usize },
    #[error("series code must start with an ASCII letter or '^': '{ch}'")]
    CodeInvalidStart { ch: char },
    #[error("series code contains invalid character '{ch}' at index {index}")]
    CodeInvalidChar { ch: char, index: usize },

    #[error("invalid series kind '{value}', expected one of equity, macro, rate")]
    InvalidSeriesKind { value: String },
    #[error("series id must look like 'kind:CODE': '{value}'")]
    InvalidSeriesId { value: String },
    #[error("invalid window '{value}', expected one of 1mo, 3mo, 6mo, 1y, 2y")]
    InvalidWindow { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("point high must be >= low")]
    InvalidPointRange,
    #[error("point open/close must be within high/low range")]
    InvalidPointBounds,
}

/// Classifier failures. Both are per-series; callers report them and move on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("series has no data points")]
    EmptySeries,
    #[error("slow moving average is zero at the latest point")]
    ZeroSlowAverage,
}
