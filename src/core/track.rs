//! Composition track: one output stream assembled from a source stream.
//! Track types are Video and Audio.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::range::TimeRange;
use crate::core::segment::Segment;
use crate::core::time::Time;
use crate::error::EditError;
use crate::media::asset::{Asset, StreamInfo};

/// Error type for track operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// Inserted range overlaps with existing segments on the track
    #[error("Range inserted at {at}ns overlaps existing segments")]
    Overlap { at: Time },
    /// Inserts must arrive in increasing destination order
    #[error("Range inserted at {at}ns precedes track end {track_end}ns")]
    OutOfOrder { at: Time, track_end: Time },
    /// Destination position is negative
    #[error("Invalid destination position {at}ns")]
    InvalidDestination { at: Time },
}

/// Unique identifier for a track within a composition
pub type TrackId = u64;

/// Type of track (video or audio)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackType::Video => write!(f, "video"),
            TrackType::Audio => write!(f, "audio"),
        }
    }
}

/// A track holds source ranges arranged on the composition timeline.
///
/// The source asset is referenced weakly: the caller keeps the asset alive
/// for as long as the composition (and any export built from it) exists.
/// Segments are non-overlapping and sorted by destination time.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub track_type: TrackType,
    source: Weak<dyn Asset>,
    pub stream_index: usize,
    segments: Vec<Segment>,
}

impl Track {
    /// Create an empty track bound to one stream of `source`.
    pub fn new(id: TrackId, track_type: TrackType, source: &Arc<dyn Asset>, stream_index: usize) -> Self {
        Self {
            id,
            track_type,
            source: Arc::downgrade(source),
            stream_index,
            segments: Vec::new(),
        }
    }

    /// The source asset, if it is still alive.
    pub fn source(&self) -> Option<Arc<dyn Asset>> {
        self.source.upgrade()
    }

    /// Metadata of the backing source stream, if the asset is still alive.
    pub fn source_stream(&self) -> Option<StreamInfo> {
        self.source()
            .and_then(|asset| asset.stream(self.stream_index).cloned())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Insert `source_range` of the backing stream at destination time `at`.
    ///
    /// Empty ranges are accepted and leave the track unchanged.
    /// # Rules
    /// - Adjacent segments (touching at boundaries) are allowed
    /// - Overlapping segments are not allowed
    /// - Destination positions must not go backwards
    pub fn insert_time_range(&mut self, source_range: TimeRange, at: Time) -> Result<(), TrackError> {
        let segment = Segment::new(source_range, at).ok_or(TrackError::InvalidDestination { at })?;
        if segment.duration() == 0 {
            return Ok(());
        }

        if self.segments.iter().any(|s| s.overlaps_with(&segment)) {
            return Err(TrackError::Overlap { at });
        }

        let track_end = self.duration();
        if at < track_end {
            return Err(TrackError::OutOfOrder { at, track_end });
        }

        self.segments.push(segment);
        Ok(())
    }

    /// Get the duration of the track in nanoseconds.
    ///
    /// Returns the end time of the last segment, or 0 if the track is empty.
    pub fn duration(&self) -> Time {
        self.segments
            .iter()
            .map(|segment| segment.target.end())
            .max()
            .unwrap_or(0)
    }

    /// Check the ordering invariant: sorted, non-overlapping destination ranges.
    pub fn is_well_formed(&self) -> bool {
        self.segments
            .windows(2)
            .all(|pair| pair[0].target.end() <= pair[1].target.start())
    }
}

impl From<(TrackError, usize)> for EditError {
    fn from((err, stream_index): (TrackError, usize)) -> Self {
        EditError::Insertion {
            stream_index,
            message: err.to_string(),
        }
    }
}
