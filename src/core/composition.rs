//! Composition: the ordered set of output tracks of a new timeline.
//! Composition → Tracks → Segments hierarchy.

use std::sync::Arc;

use crate::core::time::Time;
use crate::core::track::{Track, TrackId, TrackType};
use crate::error::{EditError, EditResult};
use crate::media::asset::Asset;

/// In-memory assembly of tracks prior to export.
///
/// The composition owns its tracks exclusively; tracks are dropped with it.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    tracks: Vec<Track>,
    next_track_id: TrackId,
}

impl Composition {
    /// Create an empty composition.
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            next_track_id: 1,
        }
    }

    /// Add an empty track bound to `stream_index` of `source`.
    ///
    /// Fails with `TrackCreation` when the asset has no such stream or the
    /// stream kind does not match `track_type`.
    pub fn add_track(
        &mut self,
        track_type: TrackType,
        source: &Arc<dyn Asset>,
        stream_index: usize,
    ) -> EditResult<&mut Track> {
        let stream = source.stream(stream_index).ok_or_else(|| {
            EditError::track_creation(format!(
                "{} has no stream {}",
                source.location().display(),
                stream_index
            ))
        })?;
        if stream.kind != track_type {
            return Err(EditError::track_creation(format!(
                "stream {} is {}, expected {}",
                stream_index, stream.kind, track_type
            )));
        }

        let id = self.next_track_id.max(1);
        self.next_track_id = id + 1;
        self.tracks.push(Track::new(id, track_type, source, stream_index));
        let last = self.tracks.len() - 1;
        Ok(&mut self.tracks[last])
    }

    /// All tracks, in insertion order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks of one kind, in insertion order.
    pub fn tracks_of(&self, track_type: TrackType) -> impl Iterator<Item = &Track> {
        self.tracks
            .iter()
            .filter(move |track| track.track_type == track_type)
    }

    pub fn track_count(&self, track_type: TrackType) -> usize {
        self.tracks_of(track_type).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Timeline duration: the end of the longest track.
    pub fn duration(&self) -> Time {
        self.tracks
            .iter()
            .map(|track| track.duration())
            .max()
            .unwrap_or(0)
    }

    /// Check that every track keeps its segments ordered and disjoint.
    pub fn validate(&self) -> EditResult<()> {
        for track in &self.tracks {
            if !track.is_well_formed() {
                return Err(EditError::Insertion {
                    stream_index: track.stream_index,
                    message: format!("track {} has overlapping or unordered segments", track.id),
                });
            }
        }
        Ok(())
    }

    /// Check that every source asset is still alive.
    pub fn sources_alive(&self) -> bool {
        self.tracks.iter().all(|track| track.source().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::range::TimeRange;
    use crate::core::time;
    use crate::media::asset::MediaAsset;

    fn asset() -> Arc<dyn Asset> {
        MediaAsset::new("test.mp4", time::from_seconds(10.0))
            .with_full_stream(TrackType::Video)
            .with_full_stream(TrackType::Audio)
            .into_shared()
    }

    #[test]
    fn test_composition_creation() {
        let composition = Composition::new();
        assert!(composition.is_empty());
        assert_eq!(composition.duration(), 0);
    }

    #[test]
    fn test_add_tracks() {
        let source = asset();
        let mut composition = Composition::new();

        let video_id = composition.add_track(TrackType::Video, &source, 0).unwrap().id;
        let audio_id = composition.add_track(TrackType::Audio, &source, 1).unwrap().id;

        assert_ne!(video_id, audio_id);
        assert_eq!(composition.track_count(TrackType::Video), 1);
        assert_eq!(composition.track_count(TrackType::Audio), 1);
    }

    #[test]
    fn test_add_track_checks_stream() {
        let source = asset();
        let mut composition = Composition::new();

        assert!(matches!(
            composition.add_track(TrackType::Video, &source, 9),
            Err(EditError::TrackCreation { .. })
        ));
        assert!(matches!(
            composition.add_track(TrackType::Video, &source, 1),
            Err(EditError::TrackCreation { .. })
        ));
        assert!(composition.is_empty());
    }

    #[test]
    fn test_duration_is_longest_track() {
        let source = asset();
        let mut composition = Composition::new();

        composition
            .add_track(TrackType::Video, &source, 0)
            .unwrap()
            .insert_time_range(TimeRange::from_seconds(0.0, 8.0).unwrap(), 0)
            .unwrap();
        composition
            .add_track(TrackType::Audio, &source, 1)
            .unwrap()
            .insert_time_range(TimeRange::from_seconds(0.0, 5.0).unwrap(), 0)
            .unwrap();

        assert_eq!(composition.duration(), time::from_seconds(8.0));
        assert!(composition.validate().is_ok());
    }

    #[test]
    fn test_sources_alive() {
        let source = asset();
        let mut composition = Composition::new();
        composition.add_track(TrackType::Video, &source, 0).unwrap();
        assert!(composition.sources_alive());

        drop(source);
        assert!(!composition.sources_alive());
    }
}
