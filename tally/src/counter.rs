//! The live request counter for the open period.
//!
//! [`LiveCounter`] is a single atomic `u64`. Request handlers share it through
//! an `Arc` and call [`increment`](LiveCounter::increment) once per request;
//! the save and rollover path reads it with [`load`](LiveCounter::load) and
//! zeroes it with [`reset`](LiveCounter::reset).
//!
//! All operations use `Ordering::Relaxed`. The counter does not publish any
//! other memory, so a save only needs an untorn snapshot, which every atomic
//! load already is.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use tally::counter::LiveCounter;
//!
//! let counter = Arc::new(LiveCounter::new());
//! let workers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let c = Arc::clone(&counter);
//!         thread::spawn(move || {
//!             for _ in 0..1000 {
//!                 c.increment();
//!             }
//!         })
//!     })
//!     .collect();
//! for w in workers {
//!     w.join().unwrap();
//! }
//! assert_eq!(counter.load(), 4000);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, TallyError};

/// Process-wide count of requests handled in the current period.
#[derive(Default)]
pub struct LiveCounter {
    requests: AtomicU64,
}

impl LiveCounter {
    /// Creates a counter starting at zero.
    pub const fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
        }
    }

    /// Counts one request.
    #[inline]
    pub fn increment(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `n` requests at once and returns the new total.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::CounterOverflow`] if the total would exceed
    /// `u64::MAX`; the counter is left unchanged.
    pub fn add(&self, n: u64) -> Result<u64> {
        self.requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                total.checked_add(n)
            })
            .map(|previous| previous + n)
            .map_err(|total| TallyError::CounterOverflow { total, added: n })
    }

    /// Returns the current total.
    #[inline]
    pub fn load(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Overwrites the total, used when restoring from storage.
    pub fn store(&self, total: u64) {
        self.requests.store(total, Ordering::Relaxed);
    }

    /// Zeroes the counter and returns the total it held.
    pub fn reset(&self) -> u64 {
        self.requests.swap(0, Ordering::Relaxed)
    }
}

impl fmt::Debug for LiveCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCounter")
            .field("requests", &self.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(LiveCounter::new().load(), 0);
        assert_eq!(LiveCounter::default().load(), 0);
    }

    #[test]
    fn test_increment_add_store() {
        let counter = LiveCounter::new();
        counter.increment();
        assert_eq!(counter.add(41).unwrap(), 42);
        assert_eq!(counter.load(), 42);

        counter.store(u64::MAX);
        assert_eq!(counter.load(), u64::MAX);
    }

    #[test]
    fn test_add_refuses_to_wrap() {
        let counter = LiveCounter::new();
        counter.store(u64::MAX - 1);

        let err = counter.add(5).unwrap_err();
        assert!(matches!(
            err,
            TallyError::CounterOverflow {
                total,
                added: 5
            } if total == u64::MAX - 1
        ));
        assert_eq!(counter.load(), u64::MAX - 1);

        assert_eq!(counter.add(1).unwrap(), u64::MAX);
        assert!(counter.add(1).is_err());
    }

    #[test]
    fn test_reset_returns_previous_total() {
        let counter = LiveCounter::new();
        counter.add(556).unwrap();
        assert_eq!(counter.reset(), 556);
        assert_eq!(counter.load(), 0);
        assert_eq!(counter.reset(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;

        let counter = Arc::new(LiveCounter::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        c.increment();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_debug_shows_total() {
        let counter = LiveCounter::new();
        counter.add(7).unwrap();
        assert_eq!(format!("{counter:?}"), "LiveCounter { requests: 7 }");
    }
}
