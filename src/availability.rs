// Availability resolution for a single target date

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::event_data::{EventCollection, EventRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    // Record found with at least one open slot
    Available,
    // Record found but nothing left
    Full,
    // Upstream had no record for the date
    Unknown,
}

impl AvailabilityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "空きあり",
            AvailabilityStatus::Full => "満室",
            AvailabilityStatus::Unknown => "データなし",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityStatus::Available)
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type DateParser = fn(&str) -> Option<NaiveDate>;

// Tried in order, first success wins
const DATE_PARSERS: [DateParser; 2] = [parse_plain_date, parse_date_time];

fn parse_plain_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_date_time(s: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.date())
}

// Drop anything from the first `T` on, then unify separators to `-`
pub fn normalize_service_date(raw: &str) -> String {
    let date_part = raw.split('T').next().unwrap_or_default();
    date_part.replace('/', "-")
}

pub fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    let normalized = normalize_service_date(raw);
    DATE_PARSERS.iter().find_map(|parse| parse(&normalized))
}

fn record_date(record: &EventRecord) -> Option<NaiveDate> {
    let raw = record.service_date.as_deref().filter(|s| !s.is_empty())?;
    let parsed = parse_service_date(raw);
    if parsed.is_none() {
        tracing::debug!(service_date = raw, "Skipping record with unparseable date");
    }
    parsed
}

// Linear scan, the first record for the target date decides
pub fn check_availability(events: &EventCollection, target_date: NaiveDate) -> AvailabilityStatus {
    events
        .iter()
        .find(|record| record_date(record) == Some(target_date))
        .map_or(AvailabilityStatus::Unknown, |record| {
            if record.has_open_slots() {
                AvailabilityStatus::Available
            } else {
                AvailabilityStatus::Full
            }
        })
}
