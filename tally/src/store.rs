//! Counter store: persistence of the live request counter.
//!
//! [`CounterStore`] ties a [`LiveCounter`] handle to a [`StorageView`] and
//! provides the three persistence operations:
//!
//! - [`load_current`](CounterStore::load_current) — restore the live counter
//!   from the current period's record at start-up
//! - [`save_current`](CounterStore::save_current) — overwrite the current
//!   period's record with the live total
//! - [`load_all`](CounterStore::load_all) — reconstruct the full monthly
//!   history (see [`history`](crate::history))
//!
//! Every record lives under [`NAMESPACE`] in the view it is given, so the
//! counters can share a store with unrelated data.
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use tally::{CounterStore, LiveCounter, MemoryView};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let counter = Arc::new(LiveCounter::new());
//! let store = CounterStore::new(MemoryView::new(), Arc::clone(&counter));
//! let now = Utc.with_ymd_and_hms(2018, 12, 5, 14, 44, 12).unwrap();
//!
//! // At start-up: pick up where the current month left off.
//! store.load_current(&now)?;
//! let mut rollover = store.rollover_coordinator_at(&now)?;
//!
//! // Request handlers.
//! counter.increment();
//!
//! // Periodic trigger: roll over if the month changed, then persist.
//! let saved = store.checkpoint(&mut rollover, &now)?;
//! assert_eq!(saved.total, 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeZone};

use crate::counter::LiveCounter;
use crate::error::{Result, TallyError};
use crate::period::PeriodKey;
use crate::record::RequestCounter;
use crate::rollover::RolloverCoordinator;
use crate::view::{StorageView, SubView};

/// Folder under which every request-counter record is stored.
pub const NAMESPACE: &str = "counters/requests/";

/// Outcome of a [`CounterStore::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// The period the total was written under.
    pub period: PeriodKey,
    /// The total that was written.
    pub total: u64,
    /// Whether the live counter was reset before writing.
    pub rolled_over: bool,
}

/// Persists a live request counter into a hierarchical key-value view.
///
/// The store itself holds no mutable state beyond the shared counter, so all
/// operations take `&self`. Saves are expected to be serialized by the caller;
/// two concurrent saves of the same period are last-writer-wins.
#[derive(Debug)]
pub struct CounterStore<V> {
    view: SubView<V>,
    counter: Arc<LiveCounter>,
}

impl<V: StorageView> CounterStore<V> {
    /// Creates a store persisting `counter` under [`NAMESPACE`] in `view`.
    pub fn new(view: V, counter: Arc<LiveCounter>) -> Self {
        Self {
            view: SubView::namespaced(view, NAMESPACE),
            counter,
        }
    }

    /// The live counter this store persists.
    pub fn counter(&self) -> &Arc<LiveCounter> {
        &self.counter
    }

    /// The view scoped to [`NAMESPACE`].
    pub fn view(&self) -> &SubView<V> {
        &self.view
    }

    /// A rollover coordinator sharing this store's live counter.
    ///
    /// The coordinator adopts the period of its first call without resetting.
    /// A host that restored the counter with
    /// [`load_current`](Self::load_current) should use
    /// [`rollover_coordinator_at`](Self::rollover_coordinator_at) instead, so a
    /// first save tick that already falls in the next month rolls over.
    pub fn rollover_coordinator(&self) -> RolloverCoordinator {
        RolloverCoordinator::new(Arc::clone(&self.counter))
    }

    /// A rollover coordinator positioned at the period containing `now`.
    ///
    /// Pass the same `now` given to [`load_current`](Self::load_current) at
    /// start-up.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::MalformedPeriodKey`] if `now` has no four-digit year.
    pub fn rollover_coordinator_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<RolloverCoordinator> {
        let period = PeriodKey::from_datetime(now)?;
        Ok(RolloverCoordinator::starting_at(
            Arc::clone(&self.counter),
            period,
        ))
    }

    /// Restores the live counter from the record of the period containing `now`.
    ///
    /// If no record exists yet (first run, or the first start-up in a new
    /// month) the counter is left untouched, as it is for a record whose total
    /// is `null`. Returns the record that was found.
    ///
    /// # Errors
    ///
    /// - [`TallyError::MalformedPeriodKey`] if `now` has no four-digit year
    /// - [`TallyError::StorageRead`] if the view read fails
    /// - [`TallyError::Decode`] if the stored bytes are not a counter record
    pub fn load_current<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Option<RequestCounter>> {
        let period = PeriodKey::from_datetime(now)?;
        let record = self.load_period(period)?;

        if let Some(total) = record.and_then(|r| r.total) {
            self.counter.store(total);
            tracing::debug!(%period, total, "restored request counter");
        } else {
            tracing::debug!(%period, "no stored request counter for current period");
        }
        Ok(record)
    }

    /// Overwrites the record of the period containing `now` with the live total.
    ///
    /// The write is a full replacement, so repeating it without intervening
    /// increments stores the same value again. Returns the total written.
    ///
    /// # Errors
    ///
    /// - [`TallyError::MalformedPeriodKey`] if `now` has no four-digit year
    /// - [`TallyError::Encode`] if the record cannot be serialized
    /// - [`TallyError::StorageWrite`] if the view write fails
    pub fn save_current<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<u64> {
        let period = PeriodKey::from_datetime(now)?;
        self.save_period(period)
    }

    /// Reads the stored record of a single period.
    ///
    /// # Errors
    ///
    /// - [`TallyError::StorageRead`] if the view read fails
    /// - [`TallyError::Decode`] if the stored bytes are not a counter record
    pub fn load_period(&self, period: PeriodKey) -> Result<Option<RequestCounter>> {
        let key = period.to_string();
        let Some(bytes) = self
            .view
            .get(&key)
            .map_err(|source| TallyError::StorageRead {
                key: key.clone(),
                source,
            })?
        else {
            return Ok(None);
        };

        RequestCounter::decode(&bytes)
            .map(Some)
            .map_err(|source| TallyError::Decode { key, source })
    }

    /// Writes the live total under `period`.
    ///
    /// # Errors
    ///
    /// - [`TallyError::Encode`] if the record cannot be serialized
    /// - [`TallyError::StorageWrite`] if the view write fails
    pub fn save_period(&self, period: PeriodKey) -> Result<u64> {
        let key = period.to_string();
        let total = self.counter.load();

        let bytes = RequestCounter::with_total(total)
            .encode()
            .map_err(|source| TallyError::Encode {
                key: key.clone(),
                source,
            })?;
        self.view
            .put(&key, &bytes)
            .map_err(|source| TallyError::StorageWrite { key, source })?;

        tracing::debug!(%period, total, "saved request counter");
        Ok(total)
    }

    /// Rolls over if the period advanced, then saves.
    ///
    /// This is the operation a periodic save trigger calls on every tick. The
    /// total is written under the coordinator's current period, which only
    /// ever moves forward: if the clock steps back into an earlier month the
    /// save keeps targeting the later one, so a closed period is never
    /// rewritten.
    ///
    /// `coordinator` should come from [`rollover_coordinator`](Self::rollover_coordinator)
    /// so that it resets the same counter this store saves.
    ///
    /// # Errors
    ///
    /// Returns any error from [`RolloverCoordinator::maybe_roll_over`] or
    /// [`save_period`](Self::save_period).
    pub fn checkpoint<Tz: TimeZone>(
        &self,
        coordinator: &mut RolloverCoordinator,
        now: &DateTime<Tz>,
    ) -> Result<Checkpoint> {
        let (period, rolled_over) = coordinator.advance(now)?;
        let total = self.save_period(period)?;
        Ok(Checkpoint {
            period,
            total,
            rolled_over,
        })
    }
}
