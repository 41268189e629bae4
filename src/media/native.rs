//! Asset provider using libav* bindings (`native-ffmpeg` feature).
//! All FFmpeg access stays inside this module.

use std::path::Path;
use std::sync::{Arc, Once};

use ffmpeg_next as ffmpeg;

use crate::core::time::{self, Time, TimeBase};
use crate::core::track::TrackType;
use crate::error::{EditError, EditResult};
use crate::media::asset::{Asset, AssetProvider, MediaAsset, StreamInfo};

static FFMPEG_INIT: Once = Once::new();

fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            tracing::error!(error = %e, "Failed to initialize FFmpeg");
        }
    });
}

/// Probes assets by opening them with libavformat.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProbe;

impl AssetProvider for NativeProbe {
    fn open(&self, location: &Path) -> EditResult<Arc<dyn Asset>> {
        init_ffmpeg();

        let context = ffmpeg::format::input(&location)
            .map_err(|e| EditError::asset_unavailable(location, e.to_string()))?;

        // Container duration is in AV_TIME_BASE (microseconds)
        let container_duration: Time = if context.duration() > 0 {
            time::from_micros(context.duration())
        } else {
            0
        };

        let mut asset = MediaAsset::new(location, container_duration);
        for stream in context.streams() {
            let kind = match stream.parameters().medium() {
                ffmpeg::media::Type::Video => TrackType::Video,
                ffmpeg::media::Type::Audio => TrackType::Audio,
                _ => continue,
            };

            let rational = stream.time_base();
            let time_base = TimeBase::new(rational.numerator(), rational.denominator());
            let duration = if stream.duration() > 0 {
                time_base.ticks_to_nanos(stream.duration()).unwrap_or(container_duration)
            } else {
                container_duration
            };

            asset = asset.with_stream(
                StreamInfo::new(stream.index(), kind, duration)
                    .with_time_base(time_base)
                    .with_codec(format!("{:?}", stream.parameters().id()).to_lowercase()),
            );
        }

        Ok(Arc::new(asset))
    }
}
