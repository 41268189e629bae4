//! Half-open time ranges `[start, end)` on a media timeline.

use std::fmt;

use crate::core::time::{self, Time, TimeBase};
use crate::error::{EditError, EditResult};

/// Immutable half-open interval in nanoseconds.
///
/// `0 <= start <= end` always holds; a zero-length range is an empty selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: Time,
    end: Time,
}

impl TimeRange {
    /// Create a range, rejecting negative bounds and `end < start`.
    pub fn new(start: Time, end: Time) -> EditResult<Self> {
        if start < 0 || end < 0 {
            return Err(EditError::invalid_range(start, end, "bounds must not be negative"));
        }
        if end < start {
            return Err(EditError::invalid_range(start, end, "end precedes start"));
        }
        Ok(Self { start, end })
    }

    /// Range covering `[0, duration)`.
    pub fn from_duration(duration: Time) -> EditResult<Self> {
        Self::new(time::ZERO, duration)
    }

    /// Create a range from seconds, rejecting NaN and infinite input.
    pub fn from_seconds(start: f64, end: f64) -> EditResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(EditError::invalid_range(
                time::ZERO,
                time::ZERO,
                format!("non-finite bounds ({start}, {end})"),
            ));
        }
        Self::new(time::from_seconds(start), time::from_seconds(end))
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn end(&self) -> Time {
        self.end
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, position: Time) -> bool {
        position >= self.start && position < self.end
    }

    /// Overlap of two ranges, `None` when they are disjoint.
    /// Touching ranges (`a.end == b.start`) are disjoint.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }

    /// True when the interiors overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.intersect(other).is_some()
    }

    /// Clip `end` down to `limit`. Fails when `start` lies beyond `limit`.
    pub fn clamp_end(&self, limit: Time) -> EditResult<TimeRange> {
        if self.start > limit {
            return Err(EditError::invalid_range(
                self.start,
                self.end,
                format!("start exceeds available duration {}ns", limit),
            ));
        }
        Ok(TimeRange {
            start: self.start,
            end: self.end.min(limit),
        })
    }

    /// Move the range by `offset`, keeping its duration.
    pub fn shift(&self, offset: Time) -> EditResult<TimeRange> {
        TimeRange::new(self.start + offset, self.end + offset)
    }

    /// Express the range as `(start_tick, duration_ticks)` in a stream time base.
    pub fn to_ticks(&self, time_base: TimeBase) -> Option<(i64, i64)> {
        let start = time_base.to_ticks(self.start)?;
        let end = time_base.to_ticks(self.end)?;
        Some((start, end - start))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            time::format_time(self.start),
            time::format_time(self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::from_seconds;

    fn secs(start: f64, end: f64) -> TimeRange {
        TimeRange::from_seconds(start, end).unwrap()
    }

    #[test]
    fn test_range_creation() {
        let range = secs(2.0, 5.0);
        assert_eq!(range.duration(), from_seconds(3.0));
        assert!(!range.is_empty());
    }

    #[test]
    fn test_empty_range_allowed() {
        let range = secs(4.0, 4.0);
        assert!(range.is_empty());
        assert_eq!(range.duration(), 0);
        assert!(!range.contains(from_seconds(4.0)));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            TimeRange::new(10, 5),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            TimeRange::new(-1, 5),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            TimeRange::from_seconds(f64::NAN, 1.0),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(TimeRange::from_seconds(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_intersect() {
        let a = secs(0.0, 5.0);
        let b = secs(3.0, 8.0);
        assert_eq!(a.intersect(&b), Some(secs(3.0, 5.0)));
        assert_eq!(b.intersect(&a), Some(secs(3.0, 5.0)));

        // Touching ranges do not overlap
        let c = secs(5.0, 6.0);
        assert_eq!(a.intersect(&c), None);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_clamp_end() {
        let range = secs(2.0, 15.0);
        let clipped = range.clamp_end(from_seconds(10.0)).unwrap();
        assert_eq!(clipped, secs(2.0, 10.0));

        // Start exactly at the limit yields an empty range
        assert!(secs(10.0, 12.0)
            .clamp_end(from_seconds(10.0))
            .unwrap()
            .is_empty());

        assert!(matches!(
            secs(12.0, 15.0).clamp_end(from_seconds(10.0)),
            Err(EditError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_repeated_operations_stay_exact() {
        // 0.1s steps accumulate without drift in integer nanoseconds
        let mut range = secs(0.0, 0.1);
        for _ in 0..1000 {
            range = range.shift(range.duration()).unwrap();
        }
        assert_eq!(range.start(), from_seconds(100.0));
        assert_eq!(range.duration(), from_seconds(0.1));
    }

    #[test]
    fn test_to_ticks() {
        let range = secs(2.0, 5.0);
        assert_eq!(range.to_ticks(TimeBase::new(1, 90_000)), Some((180_000, 270_000)));
        assert_eq!(range.to_ticks(TimeBase::new(0, 1)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(secs(1.5, 3.0).to_string(), "[00:00:01.500, 00:00:03.000)");
    }
}
