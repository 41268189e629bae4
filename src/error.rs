//! Error types for edit and export operations.

use std::path::PathBuf;

use crate::core::time::Time;
use crate::core::track::TrackType;

/// Every failure an edit operation can report.
///
/// Composition-building errors are returned synchronously from the edit call.
/// Export errors only appear as the error of a job that settled in `Failed`.
/// The type is `Clone` so job snapshots can carry it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("Invalid time range [{start}ns, {end}ns): {reason}")]
    InvalidRange {
        start: Time,
        end: Time,
        reason: String,
    },

    #[error("Asset has no {kind:?} stream")]
    MissingStream { kind: TrackType },

    #[error("Track creation failed: {message}")]
    TrackCreation { message: String },

    #[error("Insert into track for source stream {stream_index} failed: {message}")]
    Insertion { stream_index: usize, message: String },

    #[error("Exporter unavailable: {message}")]
    ExporterUnavailable { message: String },

    #[error("Export failed: {message}")]
    ExportRuntime { message: String },

    #[error("Could not remove existing output {path}: {message}")]
    OutputCleanup { path: PathBuf, message: String },

    #[error("Asset unavailable at {path}: {message}")]
    AssetUnavailable { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using EditError.
pub type EditResult<T> = Result<T, EditError>;

impl EditError {
    pub fn invalid_range(start: Time, end: Time, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            start,
            end,
            reason: reason.into(),
        }
    }

    pub fn track_creation(msg: impl Into<String>) -> Self {
        Self::TrackCreation {
            message: msg.into(),
        }
    }

    pub fn exporter_unavailable(msg: impl Into<String>) -> Self {
        Self::ExporterUnavailable {
            message: msg.into(),
        }
    }

    /// Wrap an exporter-reported failure. The message is never empty.
    pub fn export_runtime(msg: impl Into<String>) -> Self {
        let message = msg.into();
        let message = if message.trim().is_empty() {
            "exporter reported a failure without details".to_string()
        } else {
            message
        };
        Self::ExportRuntime { message }
    }

    pub fn asset_unavailable(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::AssetUnavailable {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
