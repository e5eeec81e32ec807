use std::fmt::{Debug, Formatter};

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Half-open range of local wall-clock time.
#[derive(Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive.
    pub start: NaiveDateTime,

    /// Exclusive.
    pub end: NaiveDateTime,
}

impl Debug for TimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl TimeRange {
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(self, other: NaiveDateTime) -> bool {
        (self.start <= other) && (other < self.end)
    }

    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    /// Length of the range in (fractional) days.
    pub fn days(self) -> f64 {
        self.duration().as_seconds_f64() / 86400.0
    }

    /// Length of the intersection with the other range, zero when they do not overlap.
    pub fn overlap(self, other: Self) -> TimeDelta {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end > start { end - start } else { TimeDelta::zero() }
    }

    /// Start of every step of the given length within the range.
    pub fn steps(self, step: TimeDelta) -> impl Iterator<Item = NaiveDateTime> {
        std::iter::successors(Some(self.start), move |start| Some(*start + step))
            .take_while(move |start| *start < self.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn test_contains() {
        let range = TimeRange::new(at(1), at(3));
        assert!(!range.contains(at(0)));
        assert!(range.contains(at(1)));
        assert!(range.contains(at(2)));
        assert!(!range.contains(at(3)));
    }

    #[test]
    fn test_steps() {
        let steps: Vec<_> = TimeRange::new(at(0), at(2)).steps(TimeDelta::minutes(30)).collect();
        assert_eq!(steps, [at(0), at(0) + TimeDelta::minutes(30), at(1), at(1) + TimeDelta::minutes(30)]);
    }

    #[test]
    fn test_overlap() {
        let range = TimeRange::new(at(1), at(3));
        assert_eq!(range.overlap(TimeRange::new(at(2), at(5))), TimeDelta::hours(1));
        assert_eq!(range.overlap(TimeRange::new(at(4), at(5))), TimeDelta::zero());
    }
}
