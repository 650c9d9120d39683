//! Integration tests for history reconstruction.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tally::error::{EntryFault, ViewError};
use tally::{CounterStore, FileView, LiveCounter, MemoryView, StorageView, TallyError};
use tempfile::tempdir;

/// Wraps a view and returns every listing in reverse order.
struct ReversedListing<V>(V);

impl<V: StorageView> StorageView for ReversedListing<V> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        let mut children = self.0.list(prefix)?;
        children.reverse();
        Ok(children)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        self.0.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        self.0.put(key, value)
    }
}

/// Lists a record that `get` then claims does not exist.
struct VanishingRecords(MemoryView);

impl StorageView for VanishingRecords {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        self.0.list(prefix)
    }

    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        Ok(None)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        self.0.put(key, value)
    }
}

fn month(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 15, 8, 30, 0).unwrap()
}

/// Saves `(period, total)` pairs in the given order through `store`.
fn save_all<V: StorageView>(store: &CounterStore<V>, saves: &[(DateTime<Utc>, u64)]) {
    for (now, total) in saves {
        store.counter().store(*total);
        store.save_current(now).unwrap();
    }
}

fn assert_history<V: StorageView>(store: &CounterStore<V>, expected: &[((i32, u32), u64)]) {
    let all = store.load_all().unwrap().expect("history should exist");
    let got: Vec<_> = all
        .dated
        .iter()
        .map(|d| {
            (
                (d.period_start.year(), d.period_start.month()),
                d.counter.total.unwrap(),
            )
        })
        .collect();
    assert_eq!(got, expected);

    for pair in all.dated.windows(2) {
        assert!(pair[0].period_start < pair[1].period_start);
    }
    for entry in &all.dated {
        assert_eq!(entry.period_start.day(), 1);
        assert_eq!(entry.period_start.timestamp() % 86_400, 0);
    }
}

#[test]
fn test_no_saves_means_no_history() {
    let store = CounterStore::new(MemoryView::new(), Arc::new(LiveCounter::new()));
    assert!(store.load_all().unwrap().is_none());

    let temp_dir = tempdir().unwrap();
    let store = CounterStore::new(
        FileView::open(temp_dir.path()).unwrap(),
        Arc::new(LiveCounter::new()),
    );
    assert!(store.load_all().unwrap().is_none());
}

#[test]
fn test_history_is_oldest_first_regardless_of_save_order() {
    let store = CounterStore::new(MemoryView::new(), Arc::new(LiveCounter::new()));
    save_all(
        &store,
        &[
            (month(2020, 3), 30),
            (month(2018, 11), 11),
            (month(2019, 1), 1),
            (month(2018, 2), 2),
            (month(2019, 10), 10),
        ],
    );

    assert_history(
        &store,
        &[
            ((2018, 2), 2),
            ((2018, 11), 11),
            ((2019, 1), 1),
            ((2019, 10), 10),
            ((2020, 3), 30),
        ],
    );
}

#[test]
fn test_history_sorts_unsorted_listings() {
    let store = CounterStore::new(
        ReversedListing(MemoryView::new()),
        Arc::new(LiveCounter::new()),
    );
    save_all(
        &store,
        &[
            (month(2018, 1), 1),
            (month(2018, 7), 7),
            (month(2018, 12), 12),
            (month(2019, 2), 2),
            (month(2019, 3), 3),
        ],
    );

    assert_history(
        &store,
        &[
            ((2018, 1), 1),
            ((2018, 7), 7),
            ((2018, 12), 12),
            ((2019, 2), 2),
            ((2019, 3), 3),
        ],
    );
}

#[test]
fn test_history_from_directory_store() {
    let temp_dir = tempdir().unwrap();
    let store = CounterStore::new(
        FileView::open(temp_dir.path()).unwrap(),
        Arc::new(LiveCounter::new()),
    );

    // Every month of two years, saved newest first.
    let mut saves = Vec::new();
    for year in [2019, 2018] {
        for m in (1..=12).rev() {
            saves.push((month(year, m), u64::from(m) + 100 * u64::try_from(year).unwrap()));
        }
    }
    save_all(&store, &saves);

    let expected: Vec<_> = [2018, 2019]
        .into_iter()
        .flat_map(|year| {
            (1..=12).map(move |m| ((year, m), u64::from(m) + 100 * u64::try_from(year).unwrap()))
        })
        .collect();
    assert_history(&store, &expected);
}

#[test]
fn test_history_keeps_last_saved_value_per_period() {
    let store = CounterStore::new(MemoryView::new(), Arc::new(LiveCounter::new()));
    save_all(
        &store,
        &[
            (month(2018, 12), 100),
            (month(2018, 12), 250),
            (month(2019, 1), 5),
            (month(2019, 1), 6),
        ],
    );

    assert_history(&store, &[((2018, 12), 250), ((2019, 1), 6)]);
}

#[test]
fn test_history_ignores_data_outside_namespace() {
    let view = MemoryView::new();
    view.put("counters/other/2018/12", br#"{"total":1}"#).unwrap();
    view.put("sys/policy", b"opaque").unwrap();

    let store = CounterStore::new(&view, Arc::new(LiveCounter::new()));
    assert!(store.load_all().unwrap().is_none());

    store.counter().store(3);
    store.save_current(&month(2018, 12)).unwrap();
    assert_history(&store, &[((2018, 12), 3)]);
}

#[test]
fn test_corrupt_entry_fails_whole_reconstruction() {
    let temp_dir = tempdir().unwrap();
    let view = FileView::open(temp_dir.path()).unwrap();
    let store = CounterStore::new(&view, Arc::new(LiveCounter::new()));
    save_all(&store, &[(month(2018, 11), 1), (month(2018, 12), 2), (month(2019, 1), 3)]);

    std::fs::write(temp_dir.path().join("counters/requests/2018/12"), b"\x00\x01").unwrap();

    match store.load_all() {
        Err(TallyError::CorruptHistoryEntry { key, fault }) => {
            assert_eq!(key, "2018/12");
            assert!(matches!(fault, EntryFault::Undecodable(_)));
        }
        other => panic!("expected corrupt entry, got {other:?}"),
    }
}

#[test]
fn test_vanished_entry_fails_whole_reconstruction() {
    let inner = MemoryView::new();
    inner.put("counters/requests/2018/12", br#"{"total":1}"#).unwrap();
    let store = CounterStore::new(VanishingRecords(inner), Arc::new(LiveCounter::new()));

    assert!(matches!(
        store.load_all(),
        Err(TallyError::CorruptHistoryEntry {
            fault: EntryFault::Missing,
            ..
        })
    ));
}
