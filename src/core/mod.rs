//! Core types for the edit engine.
//!
//! This module provides the timeline model used to assemble new media:
//! time values, half-open ranges, tracks, and compositions.
//! All time values are in nanoseconds (i64).

pub mod composition;
pub mod range;
pub mod segment;
pub mod time;
pub mod track;

// Re-export core data structures for easier access.
pub use composition::Composition;
pub use range::TimeRange;
pub use segment::Segment;
pub use time::{Time, TimeBase, ZERO};
pub use track::{Track, TrackError, TrackId, TrackType};
