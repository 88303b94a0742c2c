//! Chunk planning
//!
//! Splits an inclusive date interval into ordered, contiguous windows whose
//! end lies at most `max_span_days` after their start. Pure and free of I/O.

use chrono::{Days, NaiveDate};
use std::num::NonZeroU32;

use crate::models::DateRange;

/// Iterator over the fetch windows of `[start, end]`
#[derive(Debug, Clone)]
pub struct Chunks {
    cursor: Option<NaiveDate>,
    end: NaiveDate,
    span: Days,
}

impl Chunks {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate, max_span_days: NonZeroU32) -> Self {
        Self {
            cursor: (start <= end).then_some(start),
            end,
            span: Days::new(u64::from(max_span_days.get())),
        }
    }
}

impl Iterator for Chunks {
    type Item = DateRange;

    fn next(&mut self) -> Option<DateRange> {
        let cursor = self.cursor?;
        let chunk_end = cursor
            .checked_add_days(self.span)
            .map_or(self.end, |d| d.min(self.end));

        let chunk = DateRange::new(cursor, chunk_end)?;
        self.cursor = chunk.next_start().filter(|next| *next <= self.end);

        Some(chunk)
    }
}

/// Plan the windows covering `[start, end]`. Empty when `start > end`.
#[must_use]
pub fn plan(start: NaiveDate, end: NaiveDate, max_span_days: NonZeroU32) -> Vec<DateRange> {
    Chunks::new(start, end, max_span_days).collect()
}
