//! Output path policy and best-effort handling of files at the output path.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EditError;
use crate::export::settings::ContainerFormat;

/// The edit operation an output file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOperation {
    Trim,
    StripAudio,
}

impl EditOperation {
    fn label(self) -> &'static str {
        match self {
            EditOperation::Trim => "trim",
            EditOperation::StripAudio => "strip_audio",
        }
    }
}

/// Where edited files are written.
///
/// `Fixed` reuses one file per operation, replacing the previous result on
/// every call; two concurrent edits of the same operation must not be issued.
/// `PerJob` gives every job its own file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputPathPolicy {
    Fixed {
        dir: PathBuf,
        trim_file_stem: String,
        strip_audio_file_stem: String,
    },
    PerJob {
        dir: PathBuf,
    },
}

impl Default for OutputPathPolicy {
    fn default() -> Self {
        OutputPathPolicy::Fixed {
            dir: std::env::temp_dir(),
            trim_file_stem: "edited_video".to_string(),
            strip_audio_file_stem: "video_without_audio".to_string(),
        }
    }
}

impl OutputPathPolicy {
    /// Resolve the output file for one job.
    pub fn resolve(&self, operation: EditOperation, job_id: u64, container: ContainerFormat) -> PathBuf {
        let ext = container.extension();
        match self {
            OutputPathPolicy::Fixed {
                dir,
                trim_file_stem,
                strip_audio_file_stem,
            } => {
                let stem = match operation {
                    EditOperation::Trim => trim_file_stem,
                    EditOperation::StripAudio => strip_audio_file_stem,
                };
                dir.join(format!("{stem}.{ext}"))
            }
            OutputPathPolicy::PerJob { dir } => dir.join(format!(
                "{}-{}-{}.{ext}",
                operation.label(),
                std::process::id(),
                job_id
            )),
        }
    }
}

/// Remove a file left at `path` by an earlier export.
///
/// Returns `Ok(true)` when a file was removed, `Ok(false)` when nothing was there.
pub fn remove_existing_output(path: &Path) -> Result<bool, EditError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(EditError::OutputCleanup {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Clear the output path before dispatch, logging instead of failing.
pub(crate) fn prepare_output_path(path: &Path) {
    match remove_existing_output(path) {
        Ok(true) => tracing::info!(path = %path.display(), "Removed previous output file"),
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "Continuing export despite cleanup failure"),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(dir = %parent.display(), error = %err, "Failed to create output directory");
            }
        }
    }
}

/// Drop a partial file after a failed or cancelled export.
pub(crate) fn discard_partial_output(path: &Path) {
    match remove_existing_output(path) {
        Ok(true) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "Failed to remove partial output"),
    }
}
