//! Month-granularity period keys.
//!
//! A [`PeriodKey`] is a structured `(year, month)` pair. It is rendered as a
//! zero-padded `YYYY/MM` string only when it crosses the storage boundary, and
//! listed storage segments are parsed one at a time with
//! [`PeriodKey::from_segments`] rather than concatenated back into a path.
//!
//! For every year in `0..=9999` the rendered string sorts byte-wise in the same
//! order as the periods sort chronologically, which is also the derived `Ord`.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tally::period::PeriodKey;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let now = Utc.with_ymd_and_hms(2018, 12, 5, 14, 44, 12).unwrap();
//! let key = PeriodKey::from_datetime(&now)?;
//! assert_eq!(key.to_string(), "2018/12");
//! assert_eq!("2018/12".parse::<PeriodKey>()?, key);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::error::PeriodKeyError;

/// Largest year with a four-digit rendering.
const MAX_YEAR: i32 = 9999;

/// Separator between the year and month segments at the storage boundary.
pub const SEPARATOR: char = '/';

/// A calendar month, the bucketing unit for request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    // Field order matters: the derived `Ord` compares year first.
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Creates a key for the given year and month.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodKeyError::YearOutOfRange`] for years outside `0..=9999`
    /// and [`PeriodKeyError::MonthOutOfRange`] for months outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodKeyError> {
        if !(0..=MAX_YEAR).contains(&year) {
            return Err(PeriodKeyError::YearOutOfRange { year });
        }
        if !(1..=12).contains(&month) {
            return Err(PeriodKeyError::MonthOutOfRange { month });
        }
        Ok(Self { year, month })
    }

    /// Truncates a timestamp to its month.
    ///
    /// The calendar fields are taken in the timestamp's own offset, so
    /// `2019-01-01T02:00:00+05:00` belongs to January 2019 even though the same
    /// instant is still December in UTC.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodKeyError::YearOutOfRange`] if the year has no four-digit
    /// rendering.
    pub fn from_datetime<Tz: TimeZone>(time: &DateTime<Tz>) -> Result<Self, PeriodKeyError> {
        Self::new(time.year(), time.month())
    }

    /// Builds a key from separately listed year and month segments.
    ///
    /// A year segment may carry one trailing [`SEPARATOR`], as folder names do
    /// in a storage listing. Otherwise each segment must be exactly its fixed
    /// width of ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodKeyError::BadYear`] or [`PeriodKeyError::BadMonth`] for
    /// malformed segments and [`PeriodKeyError::MonthOutOfRange`] for month
    /// values outside `1..=12`.
    pub fn from_segments(year: &str, month: &str) -> Result<Self, PeriodKeyError> {
        let year = parse_year_segment(year)?;
        let month = parse_month_segment(month)?;
        Self::new(year, month)
    }

    /// The calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The calendar month, `1..=12`.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Midnight UTC on the first day of the month.
    pub fn start(&self) -> DateTime<Utc> {
        // `new` guarantees a valid year and month, so day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map_or(DateTime::<Utc>::MIN_UTC, |naive| naive.and_utc())
    }

    /// The month after this one.
    ///
    /// Returns `None` after December 9999.
    pub fn next(&self) -> Option<Self> {
        if self.month == 12 {
            Self::new(self.year + 1, 1).ok()
        } else {
            Some(Self {
                year: self.year,
                month: self.month + 1,
            })
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{SEPARATOR}{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = PeriodKeyError;

    /// Parses exactly `YYYY/MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((year, month)) = s.split_once(SEPARATOR) else {
            return Err(PeriodKeyError::BadShape { key: s.to_string() });
        };
        if year.len() != 4 || month.len() != 2 {
            return Err(PeriodKeyError::BadShape { key: s.to_string() });
        }
        Self::from_segments(year, month)
    }
}

/// Renders the month containing `time` as `YYYY/MM`.
///
/// # Errors
///
/// Returns [`PeriodKeyError::YearOutOfRange`] for years outside `0..=9999`.
pub fn format<Tz: TimeZone>(time: &DateTime<Tz>) -> Result<String, PeriodKeyError> {
    PeriodKey::from_datetime(time).map(|key| key.to_string())
}

/// Parses a `YYYY/MM` key into the start of its month.
///
/// # Errors
///
/// Returns a [`PeriodKeyError`] if `key` is not exactly `YYYY/MM` with a month
/// in `1..=12`.
pub fn parse(key: &str) -> Result<DateTime<Utc>, PeriodKeyError> {
    key.parse::<PeriodKey>().map(|key| key.start())
}

/// Parses a listed year folder such as `"2018/"`.
///
/// Unlike [`PeriodKey::from_segments`], the trailing separator is required:
/// a leaf record at the year level is not a year.
pub(crate) fn parse_year_folder(segment: &str) -> Result<i32, PeriodKeyError> {
    segment
        .strip_suffix(SEPARATOR)
        .and_then(|digits| parse_digits(digits, 4))
        .ok_or_else(|| PeriodKeyError::BadYear {
            segment: segment.to_string(),
        })
}

fn parse_year_segment(segment: &str) -> Result<i32, PeriodKeyError> {
    let digits = segment.strip_suffix(SEPARATOR).unwrap_or(segment);
    parse_digits(digits, 4).ok_or_else(|| PeriodKeyError::BadYear {
        segment: segment.to_string(),
    })
}

fn parse_month_segment(segment: &str) -> Result<u32, PeriodKeyError> {
    parse_digits(segment, 2)
        .and_then(|month| u32::try_from(month).ok())
        .ok_or_else(|| PeriodKeyError::BadMonth {
            segment: segment.to_string(),
        })
}

/// Parses exactly `width` ASCII digits.
fn parse_digits(s: &str, width: usize) -> Option<i32> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
