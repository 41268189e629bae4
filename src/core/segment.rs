//! A time range of a source stream placed on a composition track.

use crate::core::range::TimeRange;
use crate::core::time::Time;

/// A source range inserted at a destination position.
/// Source and target ranges always have the same duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub source: TimeRange, // Range in the source stream (nanoseconds)
    pub target: TimeRange, // Range on the composition timeline (nanoseconds)
}

impl Segment {
    /// Place `source` so that it starts at `target_start` on the timeline.
    pub fn new(source: TimeRange, target_start: Time) -> Option<Self> {
        let target = TimeRange::new(target_start, target_start + source.duration()).ok()?;
        Some(Self { source, target })
    }

    pub fn duration(&self) -> Time {
        self.source.duration()
    }

    /// Check if this segment overlaps with another on the timeline
    pub fn overlaps_with(&self, other: &Segment) -> bool {
        self.target.overlaps(&other.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::from_seconds;

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange::from_seconds(start, end).unwrap()
    }

    #[test]
    fn test_segment_creation() {
        let segment = Segment::new(range(1.0, 3.0), 0).unwrap();
        assert_eq!(segment.duration(), from_seconds(2.0));
        assert_eq!(segment.target, range(0.0, 2.0));
    }

    #[test]
    fn test_negative_target_rejected() {
        assert!(Segment::new(range(1.0, 3.0), -5).is_none());
    }

    #[test]
    fn test_overlaps_with() {
        let a = Segment::new(range(0.0, 10.0), 0).unwrap();
        let b = Segment::new(range(0.0, 10.0), from_seconds(5.0)).unwrap();
        let c = Segment::new(range(0.0, 10.0), from_seconds(10.0)).unwrap();

        assert!(a.overlaps_with(&b));
        assert!(b.overlaps_with(&a));
        // Adjacent segments touch but do not overlap
        assert!(!a.overlaps_with(&c));
    }
}
