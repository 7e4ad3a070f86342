//! Date helpers for the pricing core
//!
//! All external inputs carry `YYYY-MM-DD` strings; they are converted to
//! typed [`time::Date`] values exactly once at the boundary. Everything
//! inside the core passes `Date`.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration};

use crate::{ErrorCode, RentaError, Result};

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a `YYYY-MM-DD` string, returning `None` on bad input.
pub fn parse_iso_date(s: &str) -> Option<Date> {
    Date::parse(s, ISO_DATE).ok()
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_iso_date(date: Date) -> String {
    // The ISO description cannot fail for a valid Date
    date.format(ISO_DATE).unwrap_or_default()
}

/// An inclusive calendar-day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First day of the range
    pub start: Date,
    /// Last day of the range (inclusive)
    pub end: Date,
}

impl DateRange {
    /// Create a range, rejecting `end < start`.
    pub fn new(start: Date, end: Date) -> Result<Self> {
        if end < start {
            return Err(RentaError::new(
                ErrorCode::InvalidDateRange,
                format!("range end {} before start {}", end, start),
            ));
        }
        Ok(Self { start, end })
    }

    /// The trailing window `[today - days, today]`.
    pub fn trailing(today: Date, days: i64) -> Self {
        Self {
            start: today - Duration::days(days),
            end: today,
        }
    }

    /// Number of days in the range (inclusive, so at least 1).
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }

    /// Whether the given date falls inside the range.
    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterate every calendar day in the range, in order.
    pub fn iter(&self) -> impl Iterator<Item = Date> {
        let start = self.start;
        let days = self.len_days();
        (0..days).map(move |i| start + Duration::days(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("2025-03-01"), Some(date!(2025 - 03 - 01)));
        assert_eq!(parse_iso_date("2025-3-1"), None);
        assert_eq!(parse_iso_date("not a date"), None);
        assert_eq!(parse_iso_date("2025-02-30"), None);
    }

    #[test]
    fn test_format_iso_date() {
        assert_eq!(format_iso_date(date!(2025 - 12 - 09)), "2025-12-09");
    }

    #[test]
    fn test_range_iteration() {
        let range = DateRange::new(date!(2025 - 01 - 30), date!(2025 - 02 - 02)).unwrap();
        let days: Vec<Date> = range.iter().collect();
        assert_eq!(range.len_days(), 4);
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], date!(2025 - 01 - 30));
        assert_eq!(days[3], date!(2025 - 02 - 02));
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(DateRange::new(date!(2025 - 02 - 02), date!(2025 - 01 - 30)).is_err());
    }

    #[test]
    fn test_trailing_window() {
        let range = DateRange::trailing(date!(2025 - 06 - 10), 365);
        assert_eq!(range.end, date!(2025 - 06 - 10));
        assert_eq!(range.len_days(), 366);
        assert!(range.contains(date!(2024 - 06 - 11)));
    }
}
