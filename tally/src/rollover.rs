//! Period rollover for the live counter.
//!
//! [`RolloverCoordinator`] remembers the last period a save targeted. Calling
//! [`maybe_roll_over`](RolloverCoordinator::maybe_roll_over) immediately before
//! each save resets the live counter to zero when the month has advanced, so
//! the first record written for a new month only counts requests seen since
//! the rollover. The closed month keeps whatever its last save wrote.
//!
//! The coordinator takes `&mut self`: at most one save/rollover sequence is in
//! flight at a time. Request handlers keep incrementing concurrently; any
//! increments that land between the final save of the old month and the reset
//! are attributed to neither month.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};

use crate::counter::LiveCounter;
use crate::error::Result;
use crate::period::PeriodKey;

/// Detects month changes between saves and zeroes the live counter.
#[derive(Debug)]
pub struct RolloverCoordinator {
    counter: Arc<LiveCounter>,
    current: Option<PeriodKey>,
}

impl RolloverCoordinator {
    /// Creates a coordinator that has not seen a save yet.
    ///
    /// The first call to [`maybe_roll_over`](Self::maybe_roll_over) adopts the
    /// period it is given without resetting. After restoring the counter at
    /// start-up, use [`starting_at`](Self::starting_at) with the restored
    /// period instead.
    pub fn new(counter: Arc<LiveCounter>) -> Self {
        Self {
            counter,
            current: None,
        }
    }

    /// Creates a coordinator already positioned at `period`.
    pub fn starting_at(counter: Arc<LiveCounter>, period: PeriodKey) -> Self {
        Self {
            counter,
            current: Some(period),
        }
    }

    /// The period saves currently target, if any save has happened.
    pub fn current_period(&self) -> Option<PeriodKey> {
        self.current
    }

    /// Resets the live counter if `now` falls in a later month than the last
    /// save.
    ///
    /// Returns `true` if the counter was reset. A `now` in an earlier month
    /// (the clock stepped backwards) is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::MalformedPeriodKey`](crate::TallyError::MalformedPeriodKey)
    /// if `now` has no four-digit year.
    pub fn maybe_roll_over<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<bool> {
        self.advance(now).map(|(_, rolled_over)| rolled_over)
    }

    /// Applies rollover for `now` and returns the period the next save should
    /// target, plus whether the counter was reset.
    pub(crate) fn advance<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<(PeriodKey, bool)> {
        let observed = PeriodKey::from_datetime(now)?;

        let Some(current) = self.current else {
            self.current = Some(observed);
            return Ok((observed, false));
        };

        if observed > current {
            let closed_total = self.counter.reset();
            self.current = Some(observed);
            tracing::info!(
                from = %current,
                to = %observed,
                closed_total,
                "request counter rolled over"
            );
            Ok((observed, true))
        } else {
            if observed < current {
                tracing::warn!(
                    current = %current,
                    observed = %observed,
                    "clock moved back across a period boundary; keeping current period"
                );
            }
            Ok((current, false))
        }
    }
}
