//! Invoice document: a fourteen day timesheet plus the user it bills for
//!
//! The document is persisted as a whole (see [`crate::storage`]). All
//! mutation goes through three operations:
//!
//! - [`InvoiceDocument::set_hours`]: overwrite one day's hours, keep the total in sync
//! - [`InvoiceDocument::set_selected`]: move the selection cursor and re-mark today
//! - [`InvoiceDocument::set_total`]: recompute the total from the entries
//!
//! A period only ever advances through [`InvoiceDocument::successor`], which
//! builds a fresh period starting the day after the closing entry.

use super::error::{HightechError, Result};
use chrono::{Datelike, Days, Duration, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Canonical format of an entry key
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Number of days in a period
pub const PERIOD_DAYS: usize = 14;

/// Schema version written by [`InvoiceDocument::create`]
pub const SCHEMA_VERSION: i64 = 5;

/// Parse a canonical `YYYY-MM-DD` key
///
/// Non-padded forms such as `2024-1-5` are rejected: entry lookup is by
/// exact string equality, so only the canonical rendering is a valid key.
pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).map_err(|e| {
        HightechError::DateParse {
            key: key.to_string(),
            message: e.to_string(),
        }
    })?;

    if date_key(date) != key {
        return Err(HightechError::DateParse {
            key: key.to_string(),
            message: "not in canonical YYYY-MM-DD form".to_string(),
        });
    }

    Ok(date)
}

/// Serialize any value the way documents are stored: four space indentation
pub fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Render a date as an entry key
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// The person being invoiced for, carried from period to period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    pub name: String,
    pub company: String,
    pub supervisor: String,
    /// Prefix of archived invoice file names
    pub prefix: String,
    /// URL of the most recently archived invoice
    pub last_invoice: String,
}

/// One day of the timesheet
///
/// The calendar fields (`d` through `yyyy`) are a display cache filled in
/// once by [`Entry::new`] and never derived again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Hours")]
    pub hours: i64,
    #[serde(rename = "Selected")]
    pub selected: bool,
    #[serde(rename = "Today")]
    pub today: bool,
    /// Day of month
    #[serde(rename = "D")]
    pub d: u32,
    /// Zero padded day of month
    #[serde(rename = "DD")]
    pub dd: String,
    /// Weekday abbreviation
    #[serde(rename = "DDD")]
    pub ddd: String,
    /// Weekday name
    #[serde(rename = "DDDD")]
    pub dddd: String,
    /// Month number
    #[serde(rename = "M")]
    pub m: u32,
    /// Zero padded month number
    #[serde(rename = "MM")]
    pub mm: String,
    /// Month abbreviation
    #[serde(rename = "MMM")]
    pub mmm: String,
    /// Month name
    #[serde(rename = "MMMM")]
    pub mmmm: String,
    /// Two digit year
    #[serde(rename = "YY")]
    pub yy: String,
    /// Four digit year
    #[serde(rename = "YYYY")]
    pub yyyy: i32,
}

impl Entry {
    /// Build an empty entry for `date` with every calendar field populated
    pub fn new(date: NaiveDate) -> Self {
        Self {
            key: date_key(date),
            hours: 0,
            selected: false,
            today: false,
            d: date.day(),
            dd: date.format("%d").to_string(),
            ddd: date.format("%a").to_string(),
            dddd: date.format("%A").to_string(),
            m: date.month(),
            mm: date.format("%m").to_string(),
            mmm: date.format("%b").to_string(),
            mmmm: date.format("%B").to_string(),
            yy: date.format("%y").to_string(),
            yyyy: date.year(),
        }
    }
}

/// The period part of the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timesheet {
    /// Always 0, no sub-windowing
    #[serde(rename = "StartDate")]
    pub start_index: usize,
    /// Always `entries.len() - 1`
    #[serde(rename = "EndDate")]
    pub end_index: usize,
    /// Index of the selected entry
    #[serde(rename = "Selected")]
    pub selected_index: usize,
    #[serde(rename = "SelectedInRange")]
    pub selected_in_range: bool,
    #[serde(rename = "Entries")]
    pub entries: Vec<Entry>,
    #[serde(rename = "Total")]
    pub total: i64,
    #[serde(rename = "Version")]
    pub version: i64,
}

/// A whole persisted invoice document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceDocument {
    #[serde(rename = "User")]
    pub user: User,
    #[serde(rename = "Invoice")]
    pub invoice: Timesheet,
}

impl InvoiceDocument {
    /// Build a fresh period of [`PERIOD_DAYS`] days
    ///
    /// The first day is `anchor_key` advanced by `offset`. The offset is
    /// applied to midnight of the anchor, so offsets shorter than a day keep
    /// the anchor date and negative offsets move backwards.
    pub fn create(anchor_key: &str, offset: Duration) -> Result<Self> {
        let anchor = parse_date_key(anchor_key)?;
        let out_of_range = || HightechError::DateParse {
            key: anchor_key.to_string(),
            message: format!("offset {} leaves no room for a full period", offset),
        };

        let start = anchor
            .and_time(NaiveTime::default())
            .checked_add_signed(offset)
            .ok_or_else(out_of_range)?
            .date();
        // the last day must exist too, or the period would come up short
        start
            .checked_add_days(Days::new(PERIOD_DAYS as u64 - 1))
            .ok_or_else(out_of_range)?;

        let entries: Vec<Entry> = start
            .iter_days()
            .take(PERIOD_DAYS)
            .map(Entry::new)
            .collect();

        Ok(Self {
            user: User::default(),
            invoice: Timesheet {
                start_index: 0,
                end_index: entries.len() - 1,
                selected_index: 0,
                selected_in_range: false,
                entries,
                total: 0,
                version: SCHEMA_VERSION,
            },
        })
    }

    /// Parse a persisted document and run the load normalization pass
    ///
    /// Selection is reset to `today` and the total is recomputed, so a
    /// document loaded from disk never carries a stale cursor or sum.
    pub fn from_json(bytes: &[u8], today: NaiveDate) -> Result<Self> {
        let mut doc: Self = serde_json::from_slice(bytes)?;
        doc.set_selected_as_of("", today);
        doc.set_total();
        Ok(doc)
    }

    /// Serialize with four space indentation
    pub fn to_json(&self) -> Result<Vec<u8>> {
        to_indented_json(self)
    }

    /// Overwrite the hours of the entry with `key`
    ///
    /// An unknown key leaves the document untouched. Hours are taken as
    /// given, negative values included.
    pub fn set_hours(&mut self, key: &str, hours: i64) {
        if let Some(entry) = self.invoice.entries.iter_mut().find(|e| e.key == key) {
            entry.hours = hours;
            self.set_total();
        }
    }

    /// Select the entry with `key`, or today's entry when `key` is empty
    pub fn set_selected(&mut self, key: &str) {
        self.set_selected_as_of(key, Local::now().date_naive());
    }

    /// [`set_selected`](Self::set_selected) with an explicit notion of today
    ///
    /// When no entry matches, entry 0 is highlighted and `selected_in_range`
    /// keeps its previous value.
    pub fn set_selected_as_of(&mut self, key: &str, today: NaiveDate) {
        let today = date_key(today);
        let key = if key.is_empty() { today.as_str() } else { key };

        let sheet = &mut self.invoice;
        let mut found = false;
        for (i, entry) in sheet.entries.iter_mut().enumerate() {
            entry.selected = false;
            entry.today = entry.key == today;
            if entry.key == key {
                entry.selected = true;
                sheet.selected_index = i;
                sheet.selected_in_range = true;
                found = true;
            }
        }

        if !found {
            if let Some(first) = sheet.entries.first_mut() {
                first.selected = true;
                sheet.selected_index = 0;
            }
        }
    }

    /// Recompute the total from the entries
    pub fn set_total(&mut self) {
        self.invoice.total = self
            .invoice
            .entries
            .iter()
            .fold(0i64, |acc, e| acc.wrapping_add(e.hours));
    }

    /// The entry at `end_index`, the one a close is keyed on
    pub fn closing_entry(&self) -> Result<&Entry> {
        self.invoice
            .entries
            .get(self.invoice.end_index)
            .ok_or_else(|| {
                HightechError::Internal(format!(
                    "end index {} outside a period of {} entries",
                    self.invoice.end_index,
                    self.invoice.entries.len()
                ))
            })
    }

    /// The currently selected entry, if any
    pub fn selected_entry(&self) -> Option<&Entry> {
        self.invoice.entries.iter().find(|e| e.selected)
    }

    /// Build the period that follows this one
    ///
    /// Starts the day after the closing entry and carries the user forward
    /// with `last_invoice` pointing at the archived copy of this period.
    pub fn successor(&self, last_invoice: impl Into<String>) -> Result<Self> {
        let closing = self.closing_entry()?;
        let mut next = Self::create(&closing.key, Duration::days(1))?;
        next.user = User {
            last_invoice: last_invoice.into(),
            ..self.user.clone()
        };
        Ok(next)
    }
}
