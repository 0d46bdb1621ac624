//! Source of "today" for selection passes

use chrono::{Local, NaiveDate};

/// Provides the current calendar date in the document's local time zone
pub trait Clock: Send + Sync {
    /// Returns today's date
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the host's local time zone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock frozen on a single date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    /// Freeze the clock on a `YYYY-MM-DD` key
    ///
    /// Returns `None` when the key is not a valid date.
    pub fn from_key(key: &str) -> Option<Self> {
        NaiveDate::parse_from_str(key, super::invoice::DATE_KEY_FORMAT)
            .ok()
            .map(Self)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
