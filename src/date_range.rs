// Query window calculation for the reservation calendar

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

// Which dates around the target day are requested from upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    // Whole calendar month containing the target date
    #[default]
    Month,
    // Only the target date itself
    SingleDay,
}

impl FromStr for RangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(RangePolicy::Month),
            "day" | "single-day" => Ok(RangePolicy::SingleDay),
            other => Err(format!("expected `month` or `day`, got `{}`", other)),
        }
    }
}

impl fmt::Display for RangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangePolicy::Month => f.write_str("month"),
            RangePolicy::SingleDay => f.write_str("day"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn for_target(target: NaiveDate, policy: RangePolicy) -> Self {
        match policy {
            RangePolicy::Month => Self {
                start: first_of_month(target),
                end: last_of_month(target),
            },
            RangePolicy::SingleDay => Self {
                start: target,
                end: target,
            },
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

// Day 28 exists in every month and day 28 + 4 always lands in the next one.
// Only the last representable month has no next month, and it ends at NaiveDate::MAX.
fn last_of_month(date: NaiveDate) -> NaiveDate {
    let day_28 = date + Duration::days(28 - i64::from(date.day()));
    match day_28.checked_add_signed(Duration::days(4)) {
        Some(probe) => first_of_month(probe) - Duration::days(1),
        None => NaiveDate::MAX,
    }
}
