//! Source asset abstraction: a decodable media file with a duration and streams.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::time::{Time, TimeBase};
use crate::core::track::TrackType;
use crate::error::EditResult;

/// Information about one video or audio stream of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Container-level stream index (what `ffmpeg -map 0:N` addresses)
    pub index: usize,
    pub kind: TrackType,
    pub duration: Time, // Duration in nanoseconds
    pub time_base: TimeBase,
    pub codec_name: String,
}

impl StreamInfo {
    pub fn new(index: usize, kind: TrackType, duration: Time) -> Self {
        Self {
            index,
            kind,
            duration,
            time_base: TimeBase::default(),
            codec_name: String::new(),
        }
    }

    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn with_codec(mut self, codec_name: impl Into<String>) -> Self {
        self.codec_name = codec_name.into();
        self
    }
}

/// Opaque handle to decodable media owned by the caller.
///
/// The asset must outlive every composition and export job built from it;
/// tracks only hold a weak reference.
pub trait Asset: Send + Sync + std::fmt::Debug {
    /// Where the media lives (local path or URL-like location)
    fn location(&self) -> &Path;

    /// Overall duration in nanoseconds
    fn duration(&self) -> Time;

    /// All video and audio streams in container order
    fn streams(&self) -> &[StreamInfo];

    /// Streams of one kind, in container order
    fn streams_of(&self, kind: TrackType) -> Vec<&StreamInfo> {
        self.streams().iter().filter(|s| s.kind == kind).collect()
    }

    /// Look up a stream by container index
    fn stream(&self, index: usize) -> Option<&StreamInfo> {
        self.streams().iter().find(|s| s.index == index)
    }
}

/// Opens assets from a location.
pub trait AssetProvider: Send + Sync {
    fn open(&self, location: &Path) -> EditResult<Arc<dyn Asset>>;
}

/// Plain in-memory asset description.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    location: PathBuf,
    duration: Time,
    streams: Vec<StreamInfo>,
}

impl MediaAsset {
    pub fn new(location: impl Into<PathBuf>, duration: Time) -> Self {
        Self {
            location: location.into(),
            duration,
            streams: Vec::new(),
        }
    }

    /// Append a stream; kept sorted by container index.
    pub fn with_stream(mut self, stream: StreamInfo) -> Self {
        self.streams.push(stream);
        self.streams.sort_by_key(|s| s.index);
        self
    }

    /// Convenience: add a stream spanning the whole asset at the next index.
    pub fn with_full_stream(self, kind: TrackType) -> Self {
        let index = self.streams.len();
        let duration = self.duration;
        self.with_stream(StreamInfo::new(index, kind, duration))
    }

    pub fn into_shared(self) -> Arc<dyn Asset> {
        Arc::new(self)
    }
}

impl Asset for MediaAsset {
    fn location(&self) -> &Path {
        &self.location
    }

    fn duration(&self) -> Time {
        self.duration
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::from_seconds;

    #[test]
    fn test_streams_by_kind() {
        let asset = MediaAsset::new("clip.mp4", from_seconds(10.0))
            .with_full_stream(TrackType::Video)
            .with_full_stream(TrackType::Audio)
            .with_full_stream(TrackType::Audio);

        assert_eq!(asset.streams_of(TrackType::Video).len(), 1);
        assert_eq!(asset.streams_of(TrackType::Audio).len(), 2);
        assert_eq!(asset.stream(2).map(|s| s.kind), Some(TrackType::Audio));
        assert!(asset.stream(7).is_none());
    }

    #[test]
    fn test_streams_sorted_by_index() {
        let asset = MediaAsset::new("clip.mov", from_seconds(4.0))
            .with_stream(StreamInfo::new(1, TrackType::Audio, from_seconds(4.0)))
            .with_stream(StreamInfo::new(0, TrackType::Video, from_seconds(4.0)));

        let indices: Vec<usize> = asset.streams().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
