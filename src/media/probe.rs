//! Asset provider that probes media with the `ffprobe` CLI.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::time::{self, Time, TimeBase};
use crate::core::track::TrackType;
use crate::error::{EditError, EditResult};
use crate::media::asset::{Asset, AssetProvider, MediaAsset, StreamInfo};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    time_base: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Opens assets by running `ffprobe -show_format -show_streams -of json`.
#[derive(Debug, Clone)]
pub struct FfprobeProvider {
    binary: PathBuf,
}

impl Default for FfprobeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeProvider {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

impl AssetProvider for FfprobeProvider {
    fn open(&self, location: &Path) -> EditResult<Arc<dyn Asset>> {
        if !location.exists() {
            return Err(EditError::asset_unavailable(location, "file not found"));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-show_format",
                "-show_streams",
                "-of",
                "json",
            ])
            .arg(location)
            .output()
            .map_err(|e| EditError::asset_unavailable(location, format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EditError::asset_unavailable(location, stderr.trim().to_string()));
        }

        let json = String::from_utf8_lossy(&output.stdout);
        let asset = parse_probe_json(location, &json)?;
        tracing::debug!(
            path = %location.display(),
            duration = %time::format_time(asset.duration()),
            streams = asset.streams().len(),
            "Probed asset"
        );
        Ok(Arc::new(asset))
    }
}

/// Build an asset from ffprobe JSON output. Non audio/video streams are skipped.
pub fn parse_probe_json(location: &Path, json: &str) -> EditResult<MediaAsset> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| EditError::asset_unavailable(location, format!("invalid ffprobe output: {e}")))?;

    let streams: Vec<StreamInfo> = probe
        .streams
        .iter()
        .filter_map(|stream| {
            let kind = match stream.codec_type.as_deref() {
                Some("video") => TrackType::Video,
                Some("audio") => TrackType::Audio,
                _ => return None,
            };
            Some(
                StreamInfo::new(stream.index, kind, parse_seconds(stream.duration.as_deref()).unwrap_or(0))
                    .with_time_base(
                        stream
                            .time_base
                            .as_deref()
                            .and_then(parse_time_base)
                            .unwrap_or_default(),
                    )
                    .with_codec(stream.codec_name.clone().unwrap_or_default()),
            )
        })
        .collect();

    // Container duration, falling back to the longest stream
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| streams.iter().map(|s| s.duration).max())
        .unwrap_or(0);

    Ok(streams
        .into_iter()
        .fold(MediaAsset::new(location, duration), MediaAsset::with_stream))
}

fn parse_seconds(value: Option<&str>) -> Option<Time> {
    let seconds = value?.trim().parse::<f64>().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(time::from_seconds(seconds))
    } else {
        None
    }
}

fn parse_time_base(value: &str) -> Option<TimeBase> {
    let (num, den) = value.split_once('/')?;
    Some(TimeBase::new(num.trim().parse().ok()?, den.trim().parse().ok()?))
}
