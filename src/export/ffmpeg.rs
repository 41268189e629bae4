//! Exporter backed by the `ffmpeg` command-line tool.
//!
//! Each composition track becomes one seeked input (`-ss/-t/-i`) and one
//! `-map` selector. Progress comes from `-progress pipe:1`; cancellation kills
//! the child process and is confirmed from the monitor thread.

use std::collections::{HashSet, VecDeque};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use crate::core::time::{self, Time};
use crate::error::{EditError, EditResult};
use crate::export::exporter::{CancelAck, ExportRequest, ExportSession, Exporter};
use crate::export::job::ExportReporter;
use crate::export::settings::{ContainerFormat, QualityPreset};

const STDERR_TAIL_LINES: usize = 20;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Encoders used by the re-encoding presets.
const VIDEO_ENCODER: &str = "libx264";
const AUDIO_ENCODER: &str = "aac";

/// Renders compositions by spawning `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegExporter {
    binary: PathBuf,
    capabilities: OnceLock<Option<Capabilities>>,
}

impl Default for FfmpegExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegExporter {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            capabilities: OnceLock::new(),
        }
    }

    /// Resolve the binary now, failing if it cannot be found.
    pub fn locate() -> EditResult<Self> {
        which::which("ffmpeg")
            .map(Self::with_binary)
            .map_err(|e| EditError::exporter_unavailable(format!("ffmpeg not found: {e}")))
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    /// Encoders and muxers of the installed ffmpeg, queried once.
    /// `None` when the binary cannot be run.
    fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities
            .get_or_init(|| {
                let encoders = self.list("-encoders")?;
                let muxers = self.list("-muxers")?;
                Some(Capabilities {
                    encoders: parse_listing(&encoders),
                    muxers: parse_listing(&muxers),
                })
            })
            .as_ref()
    }

    fn list(&self, flag: &str) -> Option<String> {
        let output = match Command::new(&self.binary)
            .args(["-hide_banner", flag])
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(error = %e, flag, "Failed to query ffmpeg");
                return None;
            }
        };
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Build the full ffmpeg argument list for a request.
    pub fn build_args(&self, request: &ExportRequest) -> EditResult<Vec<String>> {
        let composition = &request.composition;
        if composition.duration() <= 0 {
            return Err(EditError::exporter_unavailable(
                "composition has no media to render",
            ));
        }

        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-y",
            "-loglevel",
            "error",
            "-progress",
            "pipe:1",
            "-nostats",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut maps = Vec::new();
        for (input_index, track) in composition.tracks().iter().enumerate() {
            let segment = match track.segments() {
                [segment] if segment.target.start() == time::ZERO => *segment,
                _ => {
                    return Err(EditError::exporter_unavailable(format!(
                        "track {} needs exactly one segment at timeline start",
                        track.id
                    )))
                }
            };
            let source = track.source().ok_or_else(|| {
                EditError::track_creation(format!("source of track {} was released", track.id))
            })?;

            args.push("-ss".to_string());
            args.push(seconds_arg(segment.source.start()));
            args.push("-t".to_string());
            args.push(seconds_arg(segment.duration()));
            args.push("-i".to_string());
            args.push(source.location().to_string_lossy().into_owned());

            maps.push("-map".to_string());
            maps.push(format!("{}:{}", input_index, track.stream_index));
        }

        args.extend(maps);
        args.extend(codec_args(request.preset).iter().map(|s| s.to_string()));
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
        args.push("-f".to_string());
        args.push(request.container.muxer().to_string());
        args.push(request.output_path.to_string_lossy().into_owned());
        Ok(args)
    }
}

fn seconds_arg(nanos: Time) -> String {
    format!("{:.6}", time::to_seconds(nanos))
}

fn codec_args(preset: QualityPreset) -> &'static [&'static str] {
    match preset {
        QualityPreset::Passthrough => &["-c", "copy"],
        QualityPreset::Highest => &[
            "-c:v", "libx264", "-preset", "slow", "-crf", "18", "-c:a", "aac", "-b:a", "256k",
        ],
        QualityPreset::Medium => &[
            "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "192k",
        ],
        QualityPreset::Low => &[
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "28", "-c:a", "aac", "-b:a", "128k",
        ],
    }
}

impl Exporter for FfmpegExporter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, preset: QualityPreset, container: ContainerFormat) -> bool {
        match self.capabilities() {
            Some(capabilities) => capabilities.supports(preset, container),
            // A missing binary is reported by `begin`
            None => true,
        }
    }

    fn begin(&self, request: ExportRequest, reporter: ExportReporter) -> EditResult<Box<dyn ExportSession>> {
        if !self.is_available() {
            return Err(EditError::exporter_unavailable(format!(
                "{} not found",
                self.binary.display()
            )));
        }

        let args = self.build_args(&request)?;
        tracing::debug!(job = reporter.job_id(), args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EditError::exporter_unavailable(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(job = reporter.job_id(), pid = child.id(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EditError::exporter_unavailable("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EditError::exporter_unavailable("Failed to capture ffmpeg stderr"))?;

        let child = Arc::new(Mutex::new(child));
        let cancelled = Arc::new(AtomicBool::new(false));
        let expected = request.composition.duration();

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = thread::spawn(move || -> String {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let monitor_child = Arc::clone(&child);
        let monitor_cancelled = Arc::clone(&cancelled);
        thread::spawn(move || {
            let mut progress = ProgressState::default();
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some((key, value)) = line.trim().split_once('=') {
                    progress.update(key, value);
                    if key == "progress" {
                        reporter.progress(progress.fraction(expected));
                    }
                }
            }

            let status = wait_for_exit(&monitor_child);
            let stderr_output = stderr_task
                .join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

            if monitor_cancelled.load(Ordering::SeqCst) {
                reporter.cancelled();
                return;
            }
            match status {
                Ok(status) if status.success() => reporter.completed(),
                Ok(status) => reporter.failed(format!(
                    "ffmpeg export failed (status {}): {}",
                    status,
                    stderr_output.trim()
                )),
                Err(e) => reporter.failed(format!("Failed to wait on ffmpeg: {e}")),
            }
        });

        Ok(Box::new(FfmpegSession { child, cancelled }))
    }
}

/// Wait for the child to exit without holding its lock between polls,
/// so `FfmpegSession::cancel` can always reach it.
fn wait_for_exit(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        let polled = child.lock().unwrap_or_else(PoisonError::into_inner).try_wait();
        match polled {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(e) => return Err(e),
        }
    }
}

struct FfmpegSession {
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
}

impl ExportSession for FfmpegSession {
    fn cancel(&mut self) -> CancelAck {
        self.cancelled.store(true, Ordering::SeqCst);
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.kill() {
            // Already exited; the monitor thread settles the job either way.
            tracing::debug!(error = %e, "ffmpeg kill failed");
        }
        CancelAck::Confirmed
    }
}

/// What the installed ffmpeg can encode and mux.
#[derive(Debug, Clone, Default)]
struct Capabilities {
    encoders: HashSet<String>,
    muxers: HashSet<String>,
}

impl Capabilities {
    fn supports(&self, preset: QualityPreset, container: ContainerFormat) -> bool {
        if !self.muxers.contains(container.muxer()) {
            return false;
        }
        match preset {
            QualityPreset::Passthrough => true,
            _ => self.encoders.contains(VIDEO_ENCODER) && self.encoders.contains(AUDIO_ENCODER),
        }
    }
}

/// Names from `ffmpeg -encoders` / `-muxers` output: the second column of
/// every row after the `--` separator. Comma-joined aliases are split.
fn parse_listing(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("--"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .flat_map(|names| names.split(','))
        .map(str::to_string)
        .collect()
}

/// Accumulates `key=value` blocks from `-progress` output.
#[derive(Debug, Default)]
struct ProgressState {
    out_time: Time,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time = time::from_micros(us.max(0));
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected: Time) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected <= 0 {
            return 0.0;
        }
        (self.out_time as f64 / expected as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composition::Composition;
    use crate::core::range::TimeRange;
    use crate::core::track::TrackType;
    use crate::edit::builder::CompositionBuilder;
    use crate::media::asset::{Asset, MediaAsset};

    fn asset() -> Arc<dyn Asset> {
        MediaAsset::new("/media/in.mp4", time::from_seconds(10.0))
            .with_full_stream(TrackType::Video)
            .with_full_stream(TrackType::Audio)
            .into_shared()
    }

    fn request(composition: Composition, preset: QualityPreset) -> ExportRequest {
        ExportRequest {
            composition,
            output_path: PathBuf::from("/tmp/out.mp4"),
            preset,
            container: ContainerFormat::Mp4,
        }
    }

    #[test]
    fn test_trim_args() {
        let source = asset();
        let composition =
            CompositionBuilder::trim(&source, TimeRange::from_seconds(2.0, 5.0).unwrap()).unwrap();
        let args = FfmpegExporter::new()
            .build_args(&request(composition, QualityPreset::Passthrough))
            .unwrap();
        let joined = args.join(" ");

        assert!(joined.contains("-ss 2.000000 -t 3.000000 -i /media/in.mp4"));
        assert!(joined.contains("-map 0:0 -map 1:1"));
        assert!(joined.contains("-c copy"));
        assert!(joined.ends_with("-f mp4 /tmp/out.mp4"));
    }

    #[test]
    fn test_strip_audio_args_map_video_only() {
        let source = asset();
        let composition = CompositionBuilder::strip_audio(&source).unwrap();
        let args = FfmpegExporter::new()
            .build_args(&request(composition, QualityPreset::Highest))
            .unwrap();

        let maps: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "-map")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(maps, vec!["0:0"]);
        assert!(args.iter().any(|a| a == "libx264"));
    }

    #[test]
    fn test_empty_composition_unavailable() {
        let source = asset();
        let composition =
            CompositionBuilder::trim(&source, TimeRange::from_seconds(3.0, 3.0).unwrap()).unwrap();
        assert!(matches!(
            FfmpegExporter::new().build_args(&request(composition, QualityPreset::Low)),
            Err(EditError::ExporterUnavailable { .. })
        ));
    }

    #[test]
    fn test_released_source() {
        let source = asset();
        let composition = CompositionBuilder::strip_audio(&source).unwrap();
        drop(source);
        assert!(matches!(
            FfmpegExporter::new().build_args(&request(composition, QualityPreset::Low)),
            Err(EditError::TrackCreation { .. })
        ));
    }

    const ENCODERS: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
";

    const MUXERS: &str = "File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
  E mov             QuickTime / MOV
  E mp4             MP4 (MPEG-4 Part 14)
  E matroska,webm   Matroska
";

    #[test]
    fn test_parse_listing() {
        let encoders = parse_listing(ENCODERS);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("aac"));
        assert!(!encoders.contains("Video"));

        let muxers = parse_listing(MUXERS);
        assert!(muxers.contains("mp4"));
        assert!(muxers.contains("webm"));
        assert!(!muxers.contains("Muxing"));
    }

    #[test]
    fn test_capabilities_reject_missing_muxer_or_encoder() {
        let full = Capabilities {
            encoders: parse_listing(ENCODERS),
            muxers: parse_listing(MUXERS),
        };
        assert!(full.supports(QualityPreset::Highest, ContainerFormat::Mp4));
        assert!(full.supports(QualityPreset::Passthrough, ContainerFormat::Mov));
        // No "ipod" muxer in this build
        assert!(!full.supports(QualityPreset::Passthrough, ContainerFormat::M4v));

        let no_x264 = Capabilities {
            encoders: parse_listing(" ------\n A....D aac   AAC\n"),
            muxers: parse_listing(MUXERS),
        };
        assert!(!no_x264.supports(QualityPreset::Low, ContainerFormat::Mp4));
        assert!(no_x264.supports(QualityPreset::Passthrough, ContainerFormat::Mp4));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_does_not_wait_for_exit() {
        use std::time::Instant;

        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let child = Arc::new(Mutex::new(child));
        let waiter = {
            let child = Arc::clone(&child);
            thread::spawn(move || wait_for_exit(&child))
        };
        thread::sleep(Duration::from_millis(100));

        let mut session = FfmpegSession {
            child,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let started = Instant::now();
        assert_eq!(session.cancel(), CancelAck::Confirmed);
        assert!(started.elapsed() < Duration::from_secs(1));

        let status = waiter.join().unwrap().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_progress_state() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "1500000");
        assert!((state.fraction(time::from_seconds(3.0)) - 0.5).abs() < 1e-9);

        state.update("out_time_ms", "-4");
        assert_eq!(state.fraction(time::from_seconds(3.0)), 0.0);

        state.update("progress", "end");
        assert_eq!(state.fraction(time::from_seconds(3.0)), 1.0);
    }
}
