//! Closed calendar-date interval

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range `[start, end]` of calendar dates, `start <= end`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, returning `None` when `start > end`
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both ends included
    #[must_use]
    pub fn num_days(&self) -> u64 {
        // start <= end, so the difference is never negative
        (self.end - self.start).num_days().unsigned_abs() + 1
    }

    /// Every date of the range in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// The day after `end`, if representable
    #[must_use]
    pub fn next_start(&self) -> Option<NaiveDate> {
        self.end.checked_add_days(Days::new(1))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(DateRange::new(date(2024, 1, 2), date(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(date(2024, 2, 29), date(2024, 2, 29)).unwrap();
        assert_eq!(range.num_days(), 1);
        assert_eq!(range.days().collect::<Vec<_>>(), vec![date(2024, 2, 29)]);
        assert_eq!(range.next_start(), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_days_cross_month_boundary() {
        let range = DateRange::new(date(2024, 1, 30), date(2024, 2, 2)).unwrap();
        assert_eq!(range.num_days(), 4);
        assert_eq!(range.days().count(), 4);
        assert_eq!(range.to_string(), "2024-01-30~2024-02-02");
    }
}
