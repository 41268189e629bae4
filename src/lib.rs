//! vidtrim: trim videos and strip their audio through an asynchronous export engine.

pub mod config;
pub mod core;
pub mod edit;
pub mod error;
pub mod export;
pub mod logging;
pub mod media;

pub use config::{EngineConfig, LoggingConfig};
pub use edit::{CompositionBuilder, EditEngine};
pub use error::{EditError, EditResult};
pub use export::{ExportJob, Exporter, JobHandle, JobOutcome, JobStatus};
