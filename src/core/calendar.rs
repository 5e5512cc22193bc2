//! Calendar-week bucketing and date-window arithmetic.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// An ISO-8601 calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekBucket {
    /// ISO week-numbering year (may differ from the calendar year near January 1st).
    pub iso_year: i32,
    /// ISO week number, 1..=53.
    pub week: u32,
}

impl WeekBucket {
    /// Bucket containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            iso_year: iso.year(),
            week: iso.week(),
        }
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.iso_year, self.week)
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Lazy iterator over the ISO weeks touched by an inclusive date range.
#[derive(Debug, Clone)]
pub struct WeekBuckets {
    next_monday: Option<NaiveDate>,
    last_monday: NaiveDate,
}

impl Iterator for WeekBuckets {
    type Item = WeekBucket;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next_monday?;
        self.next_monday = current
            .checked_add_days(Days::new(7))
            .filter(|next| *next <= self.last_monday);
        Some(WeekBucket::containing(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next_monday.map_or(0, |current| {
            let weeks = (self.last_monday - current).num_days() / 7 + 1;
            usize::try_from(weeks).unwrap_or(0)
        });
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WeekBuckets {}

/// Weeks covering `[start, end]` inclusive.
///
/// A single-day range yields exactly one bucket. A reversed range is clamped
/// to `start` and also yields one bucket.
pub fn weekly_buckets(start: NaiveDate, end: NaiveDate) -> WeekBuckets {
    let end = end.max(start);
    WeekBuckets {
        next_monday: Some(monday_of(start)),
        last_monday: monday_of(end),
    }
}

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
pub fn periods_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whole days between two dates, never less than 1.
pub fn calendar_duration(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// Working days in `[start, end]`, counted per ISO week and never less than 1.
///
/// Weekdays count first. Weekend days only count for schedules longer than
/// five days, up to the excess. Each week is capped at `days_per_week`, so a
/// full week always yields exactly `days_per_week`.
pub fn working_days(start: NaiveDate, end: NaiveDate, days_per_week: f64) -> f64 {
    let cap = if days_per_week.is_finite() && days_per_week > 0.0 {
        days_per_week.min(7.0)
    } else {
        super::capacity::DEFAULT_DAYS_PER_WEEK
    };
    let weekend_allowance = (cap - 5.0).max(0.0);
    let week_total = |weekdays: f64, weekend: f64| f64::min(weekdays + weekend.min(weekend_allowance), cap);
    let end = end.max(start);

    let mut total = 0.0;
    let (mut weekdays, mut weekend) = (0.0, 0.0);
    let mut current_week = WeekBucket::containing(start);
    for day in start.iter_days().take_while(|d| *d <= end) {
        let bucket = WeekBucket::containing(day);
        if bucket != current_week {
            total += week_total(weekdays, weekend);
            (weekdays, weekend) = (0.0, 0.0);
            current_week = bucket;
        }
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            weekend += 1.0;
        } else {
            weekdays += 1.0;
        }
    }
    total += week_total(weekdays, weekend);
    total.max(1.0)
}

/// Inclusive calendar window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window, swapping the bounds if they are reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Exclusive upper bound: the day after `end`.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end.succ_opt().unwrap_or(self.end)
    }

    /// Whether the two inclusive windows share at least one day.
    pub fn overlaps(&self, other: &Self) -> bool {
        periods_overlap(
            self.start,
            self.end_exclusive(),
            other.start,
            other.end_exclusive(),
        )
    }

    /// Weeks touched by the window.
    pub fn buckets(&self) -> WeekBuckets {
        weekly_buckets(self.start, self.end)
    }
}
