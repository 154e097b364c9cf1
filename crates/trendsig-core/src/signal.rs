//! EMA crossover detection and four-state signal classification.
//!
//! The classifier runs two exponential moving averages over the closing
//! values of a series (fast span 5, slow span 20), detects golden/dead
//! crossovers between them, and maps the latest relation of the two
//! averages to a trading status:
//!
//! | Status | Condition |
//! |--------|-----------|
//! | `Warning` | fast above slow, averages within 2% and converging |
//! | `Buy` | fast above slow otherwise |
//! | `StrongBuy` | fast at/below slow, averages within 2% and narrowing |
//! | `Sell` | fast below slow otherwise |
//!
//! Output is fully determined by the input closes; no clock or provider
//! state is consulted.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::Series;
use crate::SignalError;

/// Span of the fast moving average.
pub const FAST_SPAN: usize = 5;
/// Span of the slow moving average.
pub const SLOW_SPAN: usize = 20;
/// Percent distance between the averages below which they count as close.
pub const PROXIMITY_THRESHOLD_PCT: f64 = 2.0;

/// Four-state trading signal. Variants order from strongest entry to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    StrongBuy,
    Buy,
    Warning,
    Sell,
}

impl SignalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrongBuy => "strong_buy",
            Self::Buy => "buy",
            Self::Warning => "warning",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a moving-average crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    /// Fast average moved from strictly below to strictly above the slow.
    Golden,
    /// Fast average moved from strictly above to strictly below the slow.
    Dead,
}

impl CrossDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Golden => "golden",
            Self::Dead => "dead",
        }
    }
}

impl std::fmt::Display for CrossDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrossDirection {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "golden" => Ok(Self::Golden),
            "dead" => Ok(Self::Dead),
            _ => Err(()),
        }
    }
}

/// A dated crossover event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    pub date: Date,
    pub direction: CrossDirection,
}

/// Classification of a series at its latest point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub status: SignalStatus,
    /// Latest value of the fast moving average.
    pub fast_ma: f64,
    /// Latest value of the slow moving average.
    pub slow_ma: f64,
    /// Signed percent distance of fast from slow.
    pub divergence_pct: f64,
    /// Most recent crossover in the window, if any occurred.
    pub last_crossover: Option<Crossover>,
}

/// Exponential moving average over the full input.
///
/// Seeds with the first value and applies the standard recurrence with
/// `alpha = 2 / (span + 1)`. Returns one output per input.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut output = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return output;
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    output.push(first);
    for &value in &values[1..] {
        let prev = *output.last().unwrap_or(&first);
        output.push(alpha * value + (1.0 - alpha) * prev);
    }
    output
}

/// Detect all crossover events between a fast and a slow average track.
///
/// An event fires at index `i > 0` only on a strict sign change of the
/// fast/slow relation; touching or equal averages produce no event, so
/// golden and dead can never fire at the same index.
pub fn detect_crossovers(fast: &[f64], slow: &[f64], dates: &[Date]) -> Vec<Crossover> {
    let len = fast.len().min(slow.len()).min(dates.len());
    let mut events = Vec::new();
    for i in 1..len {
        if fast[i - 1] < slow[i - 1] && fast[i] > slow[i] {
            events.push(Crossover {
                date: dates[i],
                direction: CrossDirection::Golden,
            });
        } else if fast[i - 1] > slow[i - 1] && fast[i] < slow[i] {
            events.push(Crossover {
                date: dates[i],
                direction: CrossDirection::Dead,
            });
        }
    }
    events
}

/// Classify a series at its latest point.
///
/// # Errors
/// Returns [`SignalError::EmptySeries`] for an empty series and
/// [`SignalError::ZeroSlowAverage`] when the slow average is zero at the
/// latest point (the divergence ratio would be undefined).
pub fn classify(series: &Series) -> Result<ClassificationResult, SignalError> {
    let closes = series.closes();
    if closes.is_empty() {
        return Err(SignalError::EmptySeries);
    }

    let fast = ema(&closes, FAST_SPAN);
    let slow = ema(&closes, SLOW_SPAN);
    let dates: Vec<Date> = series.points.iter().map(|point| point.date).collect();
    let events = detect_crossovers(&fast, &slow, &dates);

    let last = closes.len() - 1;
    // A length-1 series has no prior point; treat it as unchanged.
    let prev = last.saturating_sub(1);

    let fast_ma = fast[last];
    let slow_ma = slow[last];
    if slow_ma == 0.0 {
        return Err(SignalError::ZeroSlowAverage);
    }

    let diff = fast_ma - slow_ma;
    let prev_diff = fast[prev] - slow[prev];
    let divergence_pct = diff / slow_ma * 100.0;
    let is_close = divergence_pct.abs() < PROXIMITY_THRESHOLD_PCT;

    let status = if fast_ma > slow_ma {
        if is_close && diff < prev_diff {
            SignalStatus::Warning
        } else {
            SignalStatus::Buy
        }
    } else if is_close && diff.abs() < prev_diff.abs() {
        SignalStatus::StrongBuy
    } else {
        SignalStatus::Sell
    };

    Ok(ClassificationResult {
        status,
        fast_ma,
        slow_ma,
        divergence_pct,
        last_crossover: events.last().copied(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeriesId, SeriesPoint};
    use time::macros::date;
    use time::Duration;

    fn series_from_closes(closes: &[f64]) -> Series {
        let id = SeriesId::equity("TEST").expect("valid id");
        let start = date!(2026 - 06 - 01);
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                SeriesPoint::scalar(start + Duration::days(i as i64), close)
                    .expect("valid point")
            })
            .collect();
        Series::new(id, points)
    }

    #[test]
    fn ema_seeds_with_first_value() {
        let track = ema(&[10.0, 10.0, 10.0], 5);
        assert_eq!(track, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn ema_follows_recurrence() {
        let track = ema(&[10.0, 13.0], 5);
        // alpha = 2/6, so the second value is 10 + (13-10)/3.
        assert!((track[1] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_is_rejected() {
        let err = classify(&series_from_closes(&[])).expect_err("must fail");
        assert_eq!(err, SignalError::EmptySeries);
    }

    #[test]
    fn single_point_series_classifies_without_crossover() {
        let result = classify(&series_from_closes(&[100.0])).expect("classify");
        // fast == slow == close, diff is zero: not above, close, not narrowing.
        assert_eq!(result.status, SignalStatus::Sell);
        assert_eq!(result.last_crossover, None);
    }

    #[test]
    fn zero_closes_are_rejected_not_nan() {
        let err = classify(&series_from_closes(&[0.0, 0.0])).expect_err("must fail");
        assert_eq!(err, SignalError::ZeroSlowAverage);
    }

    #[test]
    fn sustained_rise_reads_buy() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + f64::from(i)).collect();
        let result = classify(&series_from_closes(&closes)).expect("classify");
        assert_eq!(result.status, SignalStatus::Buy);
        assert!(result.fast_ma > result.slow_ma);
    }

    #[test]
    fn sustained_fall_reads_sell() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - 2.0 * f64::from(i)).collect();
        let result = classify(&series_from_closes(&closes)).expect("classify");
        assert_eq!(result.status, SignalStatus::Sell);
    }

    #[test]
    fn crossovers_require_strict_sign_change() {
        // Constant closes keep the averages exactly equal; no event may fire.
        let closes = vec![100.0; 40];
        let result = classify(&series_from_closes(&closes)).expect("classify");
        assert_eq!(result.last_crossover, None);
    }

    #[test]
    fn decline_then_jump_produces_golden_cross() {
        // Gentle decline pushes the fast average strictly below the slow,
        // then a jump pulls it back across.
        let mut closes: Vec<f64> = (0..25).map(|i| 102.0 - 0.16 * f64::from(i)).collect();
        closes.push(150.0);
        let result = classify(&series_from_closes(&closes)).expect("classify");

        let cross = result.last_crossover.expect("crossover expected");
        assert_eq!(cross.direction, CrossDirection::Golden);
        assert_eq!(result.status, SignalStatus::Buy);
    }

    #[test]
    fn rise_then_drop_produces_dead_cross() {
        let mut closes: Vec<f64> = (0..25).map(|i| 98.0 + 0.16 * f64::from(i)).collect();
        closes.push(60.0);
        let result = classify(&series_from_closes(&closes)).expect("classify");

        let cross = result.last_crossover.expect("crossover expected");
        assert_eq!(cross.direction, CrossDirection::Dead);
        assert_eq!(result.status, SignalStatus::Sell);
    }

    #[test]
    fn classification_is_deterministic() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + (f64::from(i) * 0.7).sin() * 5.0)
            .collect();
        let series = series_from_closes(&closes);
        let first = classify(&series).expect("classify");
        let second = classify(&series).expect("classify");
        assert_eq!(first, second);
    }

    #[test]
    fn warning_requires_proximity_and_convergence() {
        // Long flat stretch at 100 with a small recent dip: fast stays just
        // above slow while closing in on it.
        let mut closes = vec![90.0; 5];
        closes.extend(std::iter::repeat(100.0).take(30));
        closes.push(99.0);
        let result = classify(&series_from_closes(&closes)).expect("classify");
        assert_eq!(result.status, SignalStatus::Warning);
        assert!(result.divergence_pct.abs() < PROXIMITY_THRESHOLD_PCT);
    }
}
