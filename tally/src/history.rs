//! Reconstruction of the full monthly history.
//!
//! Records are stored two levels deep under the counters namespace, one
//! folder per year and one record per month. [`CounterStore::load_all`] walks
//! both levels, parsing each listed segment on its own, and sorts both levels
//! itself since a [`StorageView`] listing makes no ordering promise.
//!
//! Reconstruction is all or nothing: any listed entry that cannot be loaded
//! aborts the whole call, so a caller never mistakes a partial series for the
//! real one.

use crate::error::{EntryFault, Result, TallyError};
use crate::period::{PeriodKey, SEPARATOR, parse_year_folder};
use crate::record::{AllRequestCounters, DatedRequestCounter, RequestCounter};
use crate::store::CounterStore;
use crate::view::StorageView;

impl<V: StorageView> CounterStore<V> {
    /// Loads every stored period, oldest first.
    ///
    /// Returns `Ok(None)` when no year folders exist at all, meaning no
    /// history has been written yet.
    ///
    /// # Errors
    ///
    /// - [`TallyError::StorageRead`] if a listing fails
    /// - [`TallyError::MalformedPeriodKey`] if a listed folder or record name
    ///   is not a year or month
    /// - [`TallyError::CorruptHistoryEntry`] if a listed record cannot be read,
    ///   cannot be decoded, or vanished after being listed
    pub fn load_all(&self) -> Result<Option<AllRequestCounters>> {
        let year_segments = self.list_segments("")?;
        if year_segments.is_empty() {
            return Ok(None);
        }

        let mut years = year_segments
            .iter()
            .map(|segment| parse_year_folder(segment))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        years.sort_unstable();

        let mut all = AllRequestCounters::default();
        for year in years {
            let folder = format!("{year:04}{SEPARATOR}");
            let mut months = self
                .list_segments(&folder)?
                .iter()
                .map(|month| PeriodKey::from_segments(&folder, month))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            months.sort_unstable();

            for period in months {
                let counter = self.load_listed(period)?;
                all.dated.push(DatedRequestCounter {
                    period_start: period.start(),
                    counter,
                });
            }
        }

        tracing::debug!(periods = all.len(), "loaded request counter history");
        Ok(Some(all))
    }

    fn list_segments(&self, prefix: &str) -> Result<Vec<String>> {
        self.view()
            .list(prefix)
            .map_err(|source| TallyError::StorageRead {
                key: format!("{}{prefix}", self.view().prefix()),
                source,
            })
    }

    /// Loads a record that a listing said exists.
    fn load_listed(&self, period: PeriodKey) -> Result<RequestCounter> {
        let key = period.to_string();
        let corrupt = |fault| TallyError::CorruptHistoryEntry {
            key: key.clone(),
            fault,
        };

        let bytes = self
            .view()
            .get(&key)
            .map_err(|e| corrupt(EntryFault::Unreadable(e)))?
            .ok_or_else(|| corrupt(EntryFault::Missing))?;
        RequestCounter::decode(&bytes).map_err(|e| corrupt(EntryFault::Undecodable(e)))
    }
}
