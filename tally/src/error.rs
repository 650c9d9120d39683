//! Error types for the tally request-counter store.

use std::time::Duration;

use thiserror::Error;

/// The main error type for all tally operations.
///
/// "No record at this key" and "nothing listed under this prefix" are never
/// errors; they surface as `None` or empty results so callers can tell a
/// never-written period apart from a failed read.
#[derive(Error, Debug)]
pub enum TallyError {
    /// The storage view failed while reading or listing.
    #[error("failed to read request counters at '{key}': {source}")]
    StorageRead {
        /// The key or prefix that was being read.
        key: String,
        /// The underlying view error.
        #[source]
        source: ViewError,
    },

    /// The storage view failed while writing.
    #[error("failed to save request counters at '{key}': {source}")]
    StorageWrite {
        /// The key that was being written.
        key: String,
        /// The underlying view error.
        #[source]
        source: ViewError,
    },

    /// A counter record could not be serialized.
    #[error("failed to create request counters entry for '{key}': {source}")]
    Encode {
        /// The key the record was destined for.
        key: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A stored record could not be decoded into a counter.
    #[error("failed to decode request counters at '{key}': {source}")]
    Decode {
        /// The key the record was read from.
        key: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A period key (or one of its listed segments) is not well formed.
    #[error("malformed period key: {0}")]
    MalformedPeriodKey(#[from] PeriodKeyError),

    /// A record listed in the history could not be loaded.
    #[error("corrupt history entry '{key}': {fault}")]
    CorruptHistoryEntry {
        /// The period key of the broken entry.
        key: String,
        /// What went wrong with it.
        #[source]
        fault: EntryFault,
    },

    /// Adding to the live counter would exceed `u64::MAX`.
    #[error("request counter overflow: {total} + {added} exceeds u64::MAX")]
    CounterOverflow {
        /// The total before the addition.
        total: u64,
        /// The amount that was being added.
        added: u64,
    },

    /// Configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by a [`StorageView`](crate::view::StorageView) backend.
#[derive(Error, Debug)]
pub enum ViewError {
    /// A filesystem operation failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The path being accessed.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key or prefix is not acceptable to this backend.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A lock protecting the backend was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,

    /// The backend refused the operation.
    #[error("storage unavailable: {reason}")]
    Unavailable {
        /// Backend-supplied description.
        reason: String,
    },
}

/// Reasons a period key string or listed segment was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodKeyError {
    /// The key is not exactly `YYYY/MM`.
    #[error("'{key}' is not of the form YYYY/MM")]
    BadShape {
        /// The offending key.
        key: String,
    },

    /// A year segment is not exactly four ASCII digits.
    #[error("'{segment}' is not a four-digit year")]
    BadYear {
        /// The offending segment.
        segment: String,
    },

    /// A month segment is not exactly two ASCII digits.
    #[error("'{segment}' is not a two-digit month")]
    BadMonth {
        /// The offending segment.
        segment: String,
    },

    /// The month is outside 1..=12.
    #[error("month {month} is out of range")]
    MonthOutOfRange {
        /// The parsed month value.
        month: u32,
    },

    /// The year cannot be rendered as four digits.
    #[error("year {year} is outside 0..=9999")]
    YearOutOfRange {
        /// The year of the rejected timestamp.
        year: i32,
    },
}

/// Why a listed history entry could not be loaded.
#[derive(Error, Debug)]
pub enum EntryFault {
    /// Reading the record failed.
    #[error("unreadable: {0}")]
    Unreadable(#[source] ViewError),

    /// The record bytes are not a valid counter.
    #[error("undecodable: {0}")]
    Undecodable(#[source] serde_json::Error),

    /// The record was listed but is gone.
    #[error("listed but missing")]
    Missing,
}

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`TallyConfig`](crate::config::TallyConfig).
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: std::path::PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The save interval must be positive.
    #[error("invalid save interval {interval:?}: must be greater than zero")]
    ZeroSaveInterval {
        /// The rejected interval.
        interval: Duration,
    },

    /// No store path was configured.
    #[error("store path cannot be empty")]
    EmptyStorePath,
}

/// Type alias for `Result<T, TallyError>`.
pub type Result<T> = std::result::Result<T, TallyError>;
