//! Persisted counter records.
//!
//! Each period's record is stored as `{"total": <u64 or null>}`. A history
//! entry pairs a record with the start of its month and serializes as
//! `{"start_time": "...", "total": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored request counts for one (unspecified) period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounter {
    /// Requests counted; `None` means no value was recorded.
    #[serde(default)]
    pub total: Option<u64>,
}

impl RequestCounter {
    /// A record holding `total`.
    pub const fn with_total(total: u64) -> Self {
        Self { total: Some(total) }
    }

    pub(crate) fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A counter record together with the month it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedRequestCounter {
    /// Midnight UTC on the first day of the period.
    #[serde(rename = "start_time")]
    pub period_start: DateTime<Utc>,
    /// The record stored for that period.
    #[serde(flatten)]
    pub counter: RequestCounter,
}

/// Every stored period, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllRequestCounters {
    /// Entries in strictly increasing `period_start` order.
    pub dated: Vec<DatedRequestCounter>,
}

impl AllRequestCounters {
    /// Number of periods.
    pub fn len(&self) -> usize {
        self.dated.len()
    }

    /// Whether no periods are present.
    pub fn is_empty(&self) -> bool {
        self.dated.is_empty()
    }

    /// Sum of every recorded total, saturating at `u64::MAX`.
    pub fn grand_total(&self) -> u64 {
        self.dated
            .iter()
            .filter_map(|d| d.counter.total)
            .fold(0u64, u64::saturating_add)
    }
}
