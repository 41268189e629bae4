//! Exporter capability: the external renderer a job dispatches to.

use std::path::PathBuf;

use crate::core::composition::Composition;
use crate::error::EditResult;
use crate::export::job::ExportReporter;
use crate::export::settings::{ContainerFormat, QualityPreset};

/// Everything an exporter needs to render one composition.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub composition: Composition,
    pub output_path: PathBuf,
    pub preset: QualityPreset,
    pub container: ContainerFormat,
}

/// How an exporter answers a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// The exporter will report `cancelled()` (or a late terminal) through its reporter
    Confirmed,
    /// No confirmation will follow; the job settles immediately
    Unconfirmed,
}

/// A running export started by [`Exporter::begin`].
pub trait ExportSession: Send {
    /// Ask the exporter to stop. Must not block on the render finishing.
    fn cancel(&mut self) -> CancelAck;
}

/// Asynchronous renderer that materializes a composition into a file.
///
/// `begin` must return promptly; rendering happens on the exporter's own
/// execution context, which reports through `reporter`. Exactly one terminal
/// callback is expected per export, but duplicates are tolerated.
pub trait Exporter: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether this preset/container combination can be produced at all.
    fn supports(&self, preset: QualityPreset, container: ContainerFormat) -> bool;

    /// Start rendering. Errors here mean the exporter could not be constructed.
    fn begin(&self, request: ExportRequest, reporter: ExportReporter) -> EditResult<Box<dyn ExportSession>>;
}
