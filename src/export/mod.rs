//! Export jobs and the renderers they dispatch to.

pub mod exporter;
pub mod ffmpeg;
pub mod job;
pub mod output;
pub mod settings;

pub use exporter::{CancelAck, ExportRequest, ExportSession, Exporter};
pub use ffmpeg::FfmpegExporter;
pub use job::{
    next_job_id, ExportJob, ExportReporter, JobEvent, JobHandle, JobId, JobOutcome, JobSnapshot,
    JobStatus,
};
pub use output::{remove_existing_output, EditOperation, OutputPathPolicy};
pub use settings::{ContainerFormat, ExportSettings, QualityPreset};
