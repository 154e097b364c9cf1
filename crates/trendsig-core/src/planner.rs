//! Freshness policy and fetch planning.
//!
//! Given what the store already holds for a series, the planner decides
//! whether a provider call is needed at all, and if so how far back it has
//! to reach. The decision is pure; the cache service executes it.

use time::Date;

use crate::domain::{FetchWindow, SeriesKind};

/// Extra days requested beyond the stored gap to cover weekends, market
/// holidays, and late upstream publication.
pub const INCREMENTAL_SAFETY_DAYS: i64 = 5;

/// Days a policy-rate series may trail today and still count as fresh; the
/// upstream rate series publishes with a lag.
pub const POLICY_RATE_LAG_DAYS: i64 = 3;

/// What the cache service should do for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing stored yet; fetch the whole requested window.
    Full { window: FetchWindow },
    /// Stored data ends at `since`; fetch the last `span_days` days and keep
    /// only records dated after `since`.
    Incremental { since: Date, span_days: i64 },
    /// Stored data is current; serve from the store without a provider call.
    Skip,
}

/// How many days a series of this kind may trail `today` while still fresh.
const fn staleness_lag(kind: SeriesKind) -> i64 {
    match kind {
        SeriesKind::PolicyRate => POLICY_RATE_LAG_DAYS,
        SeriesKind::Equity | SeriesKind::MacroIndex => 0,
    }
}

/// Plan the fetch for one series given its stored high-water mark.
pub fn plan_fetch(
    kind: SeriesKind,
    latest: Option<Date>,
    window: FetchWindow,
    today: Date,
) -> FetchPlan {
    let Some(latest) = latest else {
        return FetchPlan::Full { window };
    };

    let gap_days = (today - latest).whole_days();
    if gap_days <= staleness_lag(kind) {
        return FetchPlan::Skip;
    }

    FetchPlan::Incremental {
        since: latest,
        span_days: gap_days + INCREMENTAL_SAFETY_DAYS,
    }
}
