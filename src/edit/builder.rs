//! Builds compositions from a source asset: trimming and audio stripping.

use std::sync::Arc;

use crate::core::composition::Composition;
use crate::core::range::TimeRange;
use crate::core::time::{self, Time};
use crate::core::track::TrackType;
use crate::error::{EditError, EditResult};
use crate::media::asset::{Asset, StreamInfo};

/// Inserts time ranges of source streams into new composition tracks.
///
/// Every insert lands at destination time zero, one track per source stream.
pub struct CompositionBuilder;

impl CompositionBuilder {
    /// Trim every video and audio stream of `asset` to `range`.
    ///
    /// Only `range.start` past the asset's duration fails with `InvalidRange`.
    /// `range.end` is clipped to each stream's own duration, and a stream that
    /// ends before `range.start` contributes no track.
    pub fn trim(asset: &Arc<dyn Asset>, range: TimeRange) -> EditResult<Composition> {
        let video = asset.streams_of(TrackType::Video);
        let audio = asset.streams_of(TrackType::Audio);
        if video.is_empty() && audio.is_empty() {
            return Err(EditError::MissingStream {
                kind: TrackType::Video,
            });
        }

        let asset_duration = video
            .iter()
            .chain(&audio)
            .map(|stream| stream_duration(asset.as_ref(), stream))
            .fold(asset.duration(), Time::max);
        if range.start() > asset_duration {
            return Err(EditError::invalid_range(
                range.start(),
                range.end(),
                format!("start exceeds asset duration {}", time::format_time(asset_duration)),
            ));
        }

        let mut composition = Composition::new();
        for stream in video.into_iter().chain(audio) {
            let available = stream_duration(asset.as_ref(), stream);
            let clipped = match range.clamp_end(available) {
                Ok(clipped) if !clipped.is_empty() || range.is_empty() => clipped,
                _ => {
                    tracing::debug!(
                        stream = stream.index,
                        start = %time::format_time(range.start()),
                        available = %time::format_time(available),
                        "Stream ends before trim start, skipping"
                    );
                    continue;
                }
            };
            if clipped.end() < range.end() {
                tracing::debug!(
                    stream = stream.index,
                    requested_end = %time::format_time(range.end()),
                    available = %time::format_time(available),
                    "Clipping trim range to stream duration"
                );
            }
            Self::insert_stream(&mut composition, asset, stream, clipped)?;
        }

        if composition.is_empty() {
            return Err(EditError::invalid_range(
                range.start(),
                range.end(),
                "no stream has media after start",
            ));
        }

        tracing::debug!(
            source = %asset.location().display(),
            %range,
            tracks = composition.tracks().len(),
            duration = %time::format_time(composition.duration()),
            "Built trim composition"
        );
        Ok(composition)
    }

    /// Copy every video stream of `asset` in full, leaving audio out.
    ///
    /// Audio tracks are never created in the output composition.
    pub fn strip_audio(asset: &Arc<dyn Asset>) -> EditResult<Composition> {
        let video = asset.streams_of(TrackType::Video);
        if video.is_empty() {
            return Err(EditError::MissingStream {
                kind: TrackType::Video,
            });
        }

        let mut composition = Composition::new();
        for stream in video {
            let full = TimeRange::from_duration(stream_duration(asset.as_ref(), stream))?;
            Self::insert_stream(&mut composition, asset, stream, full)?;
        }

        tracing::debug!(
            source = %asset.location().display(),
            omitted_audio = asset.streams_of(TrackType::Audio).len(),
            duration = %time::format_time(composition.duration()),
            "Built audio-free composition"
        );
        Ok(composition)
    }

    /// Create the destination track for `stream` and insert `source_range` at zero.
    fn insert_stream(
        composition: &mut Composition,
        asset: &Arc<dyn Asset>,
        stream: &StreamInfo,
        source_range: TimeRange,
    ) -> EditResult<()> {
        if !stream.time_base.is_valid() {
            return Err(EditError::Insertion {
                stream_index: stream.index,
                message: format!(
                    "unusable time base {}/{}",
                    stream.time_base.num, stream.time_base.den
                ),
            });
        }

        let track = composition.add_track(stream.kind, asset, stream.index)?;
        track
            .insert_time_range(source_range, time::ZERO)
            .map_err(|err| EditError::from((err, stream.index)))
    }
}

/// Duration available in a stream; streams that report none span the asset.
fn stream_duration(asset: &dyn Asset, stream: &StreamInfo) -> Time {
    if stream.duration > 0 {
        stream.duration
    } else {
        asset.duration()
    }
}
