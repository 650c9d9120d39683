//! # tally
//!
//! Durable, month-bucketed request counters.
//!
//! tally keeps a cheap in-memory count of requests handled during the current
//! calendar month, persists it into a hierarchical key-value view on a
//! periodic trigger, starts a fresh count when the month rolls over, and can
//! rebuild the complete monthly history on demand.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - One relaxed atomic add per request; no locks on the request path
//! - Each save is a full overwrite of the current month's record
//! - Rollover zeroes the live counter without touching the closed month
//! - History comes back strictly oldest-first, or not at all on error
//! - The caller supplies `now` to every operation; nothing reads the clock
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use tally::{CounterStore, FileView, LiveCounter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let counter = Arc::new(LiveCounter::new());
//! let store = CounterStore::new(FileView::open("./tally_data")?, Arc::clone(&counter));
//!
//! // Restore this month's count at start-up.
//! let started = Utc::now();
//! store.load_current(&started)?;
//! let mut rollover = store.rollover_coordinator_at(&started)?;
//!
//! // On every request:
//! counter.increment();
//!
//! // On every save tick:
//! store.checkpoint(&mut rollover, &Utc::now())?;
//!
//! // Operator query:
//! if let Some(history) = store.load_all()? {
//!     for entry in &history.dated {
//!         println!("{}: {:?}", entry.period_start, entry.counter.total);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`counter`] — The live atomic counter
//! - [`period`] — `YYYY/MM` period keys
//! - [`record`] — Persisted record types
//! - [`store`] — Load and save of the current period
//! - [`history`] — Reconstruction of every stored period
//! - [`rollover`] — Month rollover of the live counter
//! - [`view`] — The storage view trait, sub-views and the in-memory backend
//! - [`fs_view`] — The directory-backed backend
//! - [`config`] — Host configuration
//! - [`error`] — Error types

pub mod config;
pub mod counter;
pub mod error;
pub mod fs_view;
pub mod history;
pub mod period;
pub mod record;
pub mod rollover;
pub mod store;
pub mod view;

// Re-export primary API types at crate root for convenience.
pub use config::TallyConfig;
pub use counter::LiveCounter;
pub use error::{Result, TallyError};
pub use fs_view::FileView;
pub use period::PeriodKey;
pub use record::{AllRequestCounters, DatedRequestCounter, RequestCounter};
pub use rollover::RolloverCoordinator;
pub use store::{Checkpoint, CounterStore, NAMESPACE};
pub use view::{MemoryView, StorageView, SubView};
