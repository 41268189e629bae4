//! Export job state machine.
//!
//! `Idle → Exporting → {Completed | Failed | Cancelled}`. The exporter drives
//! transitions through an [`ExportReporter`]; terminal states never change
//! once reached, and progress only moves forward.
//!
//! Notifications are forwarded over a crossbeam channel to a per-job
//! dispatcher thread, so subscriber callbacks never run under the job lock
//! and always see progress before the single terminal event.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tokio::sync::watch;

use crate::core::composition::Composition;
use crate::error::EditError;
use crate::export::exporter::{CancelAck, ExportRequest, ExportSession, Exporter};
use crate::export::output;
use crate::export::settings::ExportSettings;

/// Process-unique job identifier
pub type JobId = u64;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh job id.
pub fn next_job_id() -> JobId {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Export job status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Exporting,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Final result of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { output_path: PathBuf },
    Failed(EditError),
    Cancelled,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<EditError>,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(f64),
    Terminal(JobOutcome),
}

type ProgressFn = Box<dyn FnMut(f64) + Send>;
type TerminalFn = Box<dyn FnOnce(&JobOutcome) + Send>;

enum Subscriber {
    Callbacks {
        on_progress: ProgressFn,
        on_terminal: TerminalFn,
    },
    Channel(Sender<JobEvent>),
}

impl Subscriber {
    fn progress(&mut self, fraction: f64) {
        match self {
            Subscriber::Callbacks { on_progress, .. } => on_progress(fraction),
            Subscriber::Channel(tx) => {
                let _ = tx.send(JobEvent::Progress(fraction));
            }
        }
    }

    fn terminal(self, outcome: &JobOutcome) {
        match self {
            Subscriber::Callbacks { on_terminal, .. } => on_terminal(outcome),
            Subscriber::Channel(tx) => {
                let _ = tx.send(JobEvent::Terminal(outcome.clone()));
            }
        }
    }
}

enum Dispatch {
    Subscribe(Subscriber),
    Event(JobEvent),
}

struct JobState {
    status: JobStatus,
    progress: f64,
    outcome: Option<JobOutcome>,
    cancel_requested: bool,
    composition: Option<Composition>,
    session: Option<Box<dyn ExportSession>>,
}

impl JobState {
    fn snapshot(&self, id: JobId) -> JobSnapshot {
        let error = match &self.outcome {
            Some(JobOutcome::Failed(err)) => Some(err.clone()),
            _ => None,
        };
        JobSnapshot {
            id,
            status: self.status,
            progress: self.progress,
            error,
        }
    }
}

struct JobShared {
    id: JobId,
    output_path: PathBuf,
    state: Mutex<JobState>,
    snapshot_tx: watch::Sender<JobSnapshot>,
    dispatch_tx: Sender<Dispatch>,
}

/// What a reporter callback asks the job to settle into.
enum Settle {
    Completed,
    Failed(EditError),
    Cancelled,
}

impl JobShared {
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the state to pollers and, optionally, subscribers.
    /// Called with the state lock held so notifications keep transition order.
    fn publish(&self, state: &JobState, event: Option<JobEvent>) {
        self.snapshot_tx.send_replace(state.snapshot(self.id));
        if let Some(event) = event {
            let _ = self.dispatch_tx.send(Dispatch::Event(event));
        }
    }

    fn progress(&self, fraction: f64) {
        let mut state = self.lock();
        if state.status != JobStatus::Exporting {
            tracing::trace!(job = self.id, status = ?state.status, "Ignoring progress outside export");
            return;
        }
        if !fraction.is_finite() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= state.progress {
            return;
        }
        state.progress = fraction;
        tracing::trace!(job = self.id, progress = fraction, "Export progress");
        self.publish(&state, Some(JobEvent::Progress(fraction)));
    }

    fn settle(&self, target: Settle) {
        let (outcome, released) = {
            let mut state = self.lock();
            if state.status.is_terminal() {
                tracing::debug!(job = self.id, status = ?state.status, "Ignoring callback after terminal state");
                return;
            }

            // Once cancellation was requested, any terminal report means "stopped".
            let target = if state.cancel_requested {
                Settle::Cancelled
            } else {
                target
            };

            let outcome = match target {
                Settle::Completed => {
                    state.status = JobStatus::Completed;
                    state.progress = 1.0;
                    JobOutcome::Completed {
                        output_path: self.output_path.clone(),
                    }
                }
                Settle::Failed(err) => {
                    output::discard_partial_output(&self.output_path);
                    state.status = JobStatus::Failed;
                    JobOutcome::Failed(err)
                }
                Settle::Cancelled => {
                    output::discard_partial_output(&self.output_path);
                    state.status = JobStatus::Cancelled;
                    JobOutcome::Cancelled
                }
            };
            state.outcome = Some(outcome.clone());

            // The job no longer needs the composition or the exporter session.
            let released = (state.composition.take(), state.session.take());
            self.publish(&state, Some(JobEvent::Terminal(outcome.clone())));
            (outcome, released)
        };
        drop(released);

        match &outcome {
            JobOutcome::Completed { output_path } => {
                tracing::info!(job = self.id, output = %output_path.display(), "Export completed")
            }
            JobOutcome::Failed(err) => tracing::warn!(job = self.id, error = %err, "Export failed"),
            JobOutcome::Cancelled => tracing::info!(job = self.id, "Export cancelled"),
        }
    }

    fn apply_cancel_ack(&self, ack: CancelAck) {
        match ack {
            CancelAck::Confirmed => {
                tracing::debug!(job = self.id, "Cancellation requested, awaiting exporter confirmation")
            }
            CancelAck::Unconfirmed => self.settle(Settle::Cancelled),
        }
    }
}

/// Callback sink handed to an [`Exporter`] for one job.
#[derive(Clone)]
pub struct ExportReporter {
    shared: Arc<JobShared>,
}

impl ExportReporter {
    pub fn job_id(&self) -> JobId {
        self.shared.id
    }

    /// Report render progress in `[0, 1]`. Regressions and late updates are ignored.
    pub fn progress(&self, fraction: f64) {
        self.shared.progress(fraction);
    }

    pub fn completed(&self) {
        self.shared.settle(Settle::Completed);
    }

    /// Report a render failure with the exporter's own description.
    pub fn failed(&self, message: impl Into<String>) {
        self.shared.settle(Settle::Failed(EditError::export_runtime(message)));
    }

    pub fn cancelled(&self) {
        self.shared.settle(Settle::Cancelled);
    }

    /// Whether the caller asked this job to stop.
    pub fn is_cancel_requested(&self) -> bool {
        self.shared.lock().cancel_requested
    }
}

impl std::fmt::Debug for ExportReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportReporter")
            .field("job", &self.shared.id)
            .finish()
    }
}

/// An export that has not been started yet.
///
/// Owns its composition until the job reaches a terminal state.
pub struct ExportJob {
    shared: Arc<JobShared>,
}

impl ExportJob {
    /// Create an idle job rendering `composition` to `output_path`.
    pub fn new(composition: Composition, output_path: impl Into<PathBuf>) -> Self {
        Self::with_id(next_job_id(), composition, output_path)
    }

    /// Create an idle job with a pre-allocated id.
    pub fn with_id(id: JobId, composition: Composition, output_path: impl Into<PathBuf>) -> Self {
        let state = JobState {
            status: JobStatus::Idle,
            progress: 0.0,
            outcome: None,
            cancel_requested: false,
            composition: Some(composition),
            session: None,
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot(id));
        let (dispatch_tx, dispatch_rx) = channel::unbounded();

        thread::spawn(move || run_dispatcher(id, dispatch_rx));

        Self {
            shared: Arc::new(JobShared {
                id,
                output_path: output_path.into(),
                state: Mutex::new(state),
                snapshot_tx,
                dispatch_tx,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.shared.id
    }

    pub fn status(&self) -> JobStatus {
        self.shared.lock().status
    }

    pub fn output_path(&self) -> &Path {
        &self.shared.output_path
    }

    /// Dispatch the job to `exporter`. Never blocks on rendering.
    ///
    /// Any file already at the output path is deleted first (best-effort).
    /// Failures past this point are reported through the job's `Failed` state.
    pub fn start(self, exporter: &dyn Exporter, settings: ExportSettings) -> JobHandle {
        let shared = Arc::clone(&self.shared);
        let handle = JobHandle {
            shared: Arc::clone(&shared),
        };

        output::prepare_output_path(&shared.output_path);

        let composition = {
            let mut state = shared.lock();
            state.status = JobStatus::Exporting;
            shared.publish(&state, None);
            state.composition.clone()
        };

        tracing::info!(
            job = shared.id,
            exporter = exporter.name(),
            output = %shared.output_path.display(),
            preset = %settings.preset,
            container = %settings.container,
            "Starting export"
        );

        let composition = match composition {
            Some(composition) => composition,
            None => {
                shared.settle(Settle::Failed(EditError::track_creation("job has no composition")));
                return handle;
            }
        };
        if let Err(err) = check_composition(&composition) {
            shared.settle(Settle::Failed(err));
            return handle;
        }
        if !exporter.supports(settings.preset, settings.container) {
            shared.settle(Settle::Failed(EditError::exporter_unavailable(format!(
                "{} cannot produce preset {} in container {}",
                exporter.name(),
                settings.preset,
                settings.container
            ))));
            return handle;
        }

        let request = ExportRequest {
            composition,
            output_path: shared.output_path.clone(),
            preset: settings.preset,
            container: settings.container,
        };
        let reporter = ExportReporter {
            shared: Arc::clone(&shared),
        };

        match exporter.begin(request, reporter) {
            Ok(session) => {
                let pending_cancel = {
                    let mut state = shared.lock();
                    if state.status.is_terminal() {
                        None
                    } else if state.cancel_requested {
                        Some(session)
                    } else {
                        state.session = Some(session);
                        None
                    }
                };
                if let Some(mut session) = pending_cancel {
                    shared.apply_cancel_ack(session.cancel());
                }
            }
            Err(err) => {
                let err = match err {
                    EditError::ExporterUnavailable { .. } => err,
                    other => EditError::exporter_unavailable(other.to_string()),
                };
                shared.settle(Settle::Failed(err));
            }
        }

        handle
    }
}

/// Reject compositions that cannot produce output tracks.
fn check_composition(composition: &Composition) -> Result<(), EditError> {
    if composition.is_empty() {
        return Err(EditError::track_creation("composition has no tracks"));
    }
    if !composition.sources_alive() {
        return Err(EditError::track_creation(
            "source asset was released before export",
        ));
    }
    composition.validate()
}

fn run_dispatcher(id: JobId, rx: Receiver<Dispatch>) {
    let mut subscribers: Vec<Subscriber> = Vec::new();
    while let Ok(message) = rx.recv() {
        match message {
            Dispatch::Subscribe(subscriber) => subscribers.push(subscriber),
            Dispatch::Event(JobEvent::Progress(fraction)) => {
                for subscriber in &mut subscribers {
                    subscriber.progress(fraction);
                }
            }
            Dispatch::Event(JobEvent::Terminal(outcome)) => {
                for subscriber in subscribers.drain(..) {
                    subscriber.terminal(&outcome);
                }
                break;
            }
        }
    }
    tracing::trace!(job = id, "Job dispatcher finished");
}

/// Caller-side handle to a dispatched job: poll, subscribe, cancel, await.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.shared.id
    }

    pub fn output_path(&self) -> &Path {
        &self.shared.output_path
    }

    pub fn status(&self) -> JobStatus {
        self.shared.lock().status
    }

    pub fn progress(&self) -> f64 {
        self.shared.lock().progress
    }

    /// Error of a failed job; `None` otherwise (cancelled jobs carry none).
    pub fn error(&self) -> Option<EditError> {
        self.snapshot().error
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.lock().snapshot(self.shared.id)
    }

    /// Final outcome, once the job settled.
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.shared.lock().outcome.clone()
    }

    /// Register callbacks. Progress values arrive strictly increasing and
    /// `on_terminal` runs exactly once, after the last progress call.
    /// If the job already settled, `on_terminal` runs immediately.
    pub fn subscribe<P, T>(&self, on_progress: P, on_terminal: T)
    where
        P: FnMut(f64) + Send + 'static,
        T: FnOnce(&JobOutcome) + Send + 'static,
    {
        let settled = {
            let state = self.shared.lock();
            match &state.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    let _ = self.shared.dispatch_tx.send(Dispatch::Subscribe(Subscriber::Callbacks {
                        on_progress: Box::new(on_progress),
                        on_terminal: Box::new(on_terminal),
                    }));
                    return;
                }
            }
        };
        if let Some(outcome) = settled {
            on_terminal(&outcome);
        }
    }

    /// Channel of notifications for this job, ending with `JobEvent::Terminal`.
    pub fn events(&self) -> Receiver<JobEvent> {
        let (tx, rx) = channel::unbounded();
        let state = self.shared.lock();
        match &state.outcome {
            Some(outcome) => {
                let _ = tx.send(JobEvent::Terminal(outcome.clone()));
            }
            None => {
                let _ = self.shared.dispatch_tx.send(Dispatch::Subscribe(Subscriber::Channel(tx)));
            }
        }
        rx
    }

    /// Request cancellation. Only valid while exporting; returns whether a
    /// request is in effect. The job may report `Exporting` briefly afterwards.
    pub fn cancel(&self) -> bool {
        let session = {
            let mut state = self.shared.lock();
            if state.status != JobStatus::Exporting {
                return false;
            }
            if state.cancel_requested {
                return true;
            }
            state.cancel_requested = true;
            state.session.take()
        };

        tracing::info!(job = self.shared.id, "Cancelling export");
        // Without a session yet, `start` forwards the request once `begin` returns.
        if let Some(mut session) = session {
            self.shared.apply_cancel_ack(session.cancel());
        }
        true
    }

    /// Wait for the terminal state without blocking a thread.
    pub async fn wait(&self) -> JobOutcome {
        let mut rx = self.shared.snapshot_tx.subscribe();
        loop {
            if rx.borrow_and_update().status.is_terminal() {
                if let Some(outcome) = self.outcome() {
                    return outcome;
                }
            }
            if rx.changed().await.is_err() {
                return self
                    .outcome()
                    .unwrap_or_else(|| JobOutcome::Failed(EditError::export_runtime("job state was dropped")));
            }
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.shared.id)
            .field("output_path", &self.shared.output_path)
            .finish()
    }
}
