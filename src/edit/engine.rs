//! Edit operations: build a composition and dispatch it as an export job.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::composition::Composition;
use crate::core::range::TimeRange;
use crate::edit::builder::CompositionBuilder;
use crate::error::EditResult;
use crate::export::exporter::Exporter;
use crate::export::job::{next_job_id, ExportJob, JobHandle};
use crate::export::output::EditOperation;
use crate::media::asset::Asset;

/// Entry point for trimming and audio stripping.
///
/// Composition errors are returned before any job exists. Once a handle is
/// returned, every outcome is reported through it.
///
/// The source asset must stay alive until the returned job settles; the
/// engine only keeps weak references to it.
pub struct EditEngine {
    exporter: Arc<dyn Exporter>,
    config: EngineConfig,
}

impl EditEngine {
    pub fn new(exporter: Arc<dyn Exporter>) -> Self {
        Self::with_config(exporter, EngineConfig::default())
    }

    pub fn with_config(exporter: Arc<dyn Exporter>, config: EngineConfig) -> Self {
        Self { exporter, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Export `[start_secs, end_secs)` of `asset`.
    ///
    /// With the fixed output policy this deletes the previous trim result.
    pub fn trim_video(&self, asset: &Arc<dyn Asset>, start_secs: f64, end_secs: f64) -> EditResult<JobHandle> {
        let range = TimeRange::from_seconds(start_secs, end_secs)?;
        let composition = CompositionBuilder::trim(asset, range)?;
        Ok(self.dispatch(EditOperation::Trim, composition))
    }

    /// Export the video streams of `asset` without audio.
    ///
    /// With the fixed output policy this deletes the previous result.
    pub fn remove_audio(&self, asset: &Arc<dyn Asset>) -> EditResult<JobHandle> {
        let composition = CompositionBuilder::strip_audio(asset)?;
        Ok(self.dispatch(EditOperation::StripAudio, composition))
    }

    fn dispatch(&self, operation: EditOperation, composition: Composition) -> JobHandle {
        let settings = self.config.export;
        let id = next_job_id();
        let output_path = self.config.output.resolve(operation, id, settings.container);

        tracing::info!(
            job = id,
            ?operation,
            tracks = composition.tracks().len(),
            output = %output_path.display(),
            "Dispatching edit"
        );
        ExportJob::with_id(id, composition, output_path).start(self.exporter.as_ref(), settings)
    }
}

impl std::fmt::Debug for EditEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditEngine")
            .field("exporter", &self.exporter.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time;
    use crate::core::track::TrackType;
    use crate::error::EditError;
    use crate::export::exporter::{CancelAck, ExportRequest, ExportSession};
    use crate::export::job::{ExportReporter, JobOutcome, JobStatus};
    use crate::export::output::OutputPathPolicy;
    use crate::export::settings::{ContainerFormat, QualityPreset};
    use crate::media::asset::MediaAsset;
    use std::sync::Mutex;

    /// Records every request and completes it immediately.
    #[derive(Default)]
    struct RecordingExporter {
        requests: Mutex<Vec<ExportRequest>>,
    }

    struct NoopSession;

    impl ExportSession for NoopSession {
        fn cancel(&mut self) -> CancelAck {
            CancelAck::Unconfirmed
        }
    }

    impl Exporter for RecordingExporter {
        fn name(&self) -> &str {
            "recording"
        }

        fn supports(&self, _preset: QualityPreset, _container: ContainerFormat) -> bool {
            true
        }

        fn begin(&self, request: ExportRequest, reporter: ExportReporter) -> EditResult<Box<dyn ExportSession>> {
            std::fs::write(&request.output_path, b"rendered").unwrap();
            self.requests.lock().unwrap().push(request);
            reporter.progress(1.0);
            reporter.completed();
            Ok(Box::new(NoopSession))
        }
    }

    fn asset() -> Arc<dyn Asset> {
        MediaAsset::new("clip.mp4", time::from_seconds(10.0))
            .with_full_stream(TrackType::Video)
            .with_full_stream(TrackType::Audio)
            .into_shared()
    }

    fn engine(dir: &std::path::Path) -> (Arc<RecordingExporter>, EditEngine) {
        let exporter = Arc::new(RecordingExporter::default());
        let config = EngineConfig {
            output: OutputPathPolicy::PerJob {
                dir: dir.to_path_buf(),
            },
            ..EngineConfig::default()
        };
        (exporter.clone(), EditEngine::with_config(exporter, config))
    }

    #[test]
    fn test_trim_video_dispatches_trimmed_composition() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, engine) = engine(dir.path());
        let source = asset();

        let handle = engine.trim_video(&source, 2.0, 5.0).unwrap();
        assert_eq!(handle.status(), JobStatus::Completed);
        assert!(handle.output_path().starts_with(dir.path()));

        let requests = exporter.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].composition.duration(), time::from_seconds(3.0));
        assert_eq!(requests[0].preset, QualityPreset::Highest);
        assert_eq!(requests[0].container, ContainerFormat::Mp4);
    }

    #[test]
    fn test_trim_video_rejects_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, engine) = engine(dir.path());
        let source = asset();

        assert!(matches!(
            engine.trim_video(&source, 12.0, 15.0),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            engine.trim_video(&source, 5.0, 2.0),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(exporter.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_audio_has_no_audio_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, engine) = engine(dir.path());
        let source = asset();

        let handle = engine.remove_audio(&source).unwrap();
        assert!(matches!(handle.outcome(), Some(JobOutcome::Completed { .. })));

        let requests = exporter.requests.lock().unwrap();
        let composition = &requests[0].composition;
        assert_eq!(composition.tracks_of(TrackType::Video).count(), 1);
        assert_eq!(composition.tracks_of(TrackType::Audio).count(), 0);
        assert_eq!(composition.duration(), time::from_seconds(10.0));
    }

    #[test]
    fn test_remove_audio_requires_video() {
        let dir = tempfile::tempdir().unwrap();
        let (_, engine) = engine(dir.path());
        let audio_only = MediaAsset::new("song.m4a", time::from_seconds(30.0))
            .with_full_stream(TrackType::Audio)
            .into_shared();

        assert!(matches!(
            engine.remove_audio(&audio_only),
            Err(EditError::MissingStream { kind: TrackType::Video })
        ));
    }

    #[test]
    fn test_fixed_policy_reuses_operation_path() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Arc::new(RecordingExporter::default());
        let config = EngineConfig {
            output: OutputPathPolicy::Fixed {
                dir: dir.path().to_path_buf(),
                trim_file_stem: "edited_video".to_string(),
                strip_audio_file_stem: "video_without_audio".to_string(),
            },
            ..EngineConfig::default()
        };
        let engine = EditEngine::with_config(exporter, config);
        let source = asset();

        let first = engine.trim_video(&source, 0.0, 1.0).unwrap();
        let second = engine.trim_video(&source, 1.0, 2.0).unwrap();
        let stripped = engine.remove_audio(&source).unwrap();

        assert_eq!(first.output_path(), second.output_path());
        assert_eq!(first.output_path(), dir.path().join("edited_video.mp4"));
        assert_eq!(stripped.output_path(), dir.path().join("video_without_audio.mp4"));
        assert!(second.output_path().exists());
    }
}
