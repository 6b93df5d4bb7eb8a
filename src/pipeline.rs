//! The streaming pipeline: source -> inference -> identity store -> sink, on
//! a dedicated producer thread under start/pause/resume/stop/reset control.

mod drive;
mod history;
mod state;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::detection::DetectionRecord;
use crate::error::{PipelineError, Result};
use crate::inference::InferenceStep;
use crate::sink::{ExportPaths, ExportSink, ResultSink, StopReason, TickResult};
use crate::source::{SourceKind, SourceOpener};
use crate::trajectory::{TrackIdentityStore, TrajectorySnapshot};

pub use history::{HistoryConfig, HistoryEntry, ResultHistory};
pub use state::PipelineState;

/// Longest a paused producer sleeps before re-checking for a stop request.
const PAUSE_POLL: Duration = Duration::from_millis(100);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
struct Control {
    state: PipelineState,
    stop_requested: bool,
    last_reason: Option<StopReason>,
}

/// State shared between the controlling handle and the drive thread.
struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    store: Mutex<TrackIdentityStore>,
    history: Mutex<ResultHistory>,
    frames_processed: AtomicU64,
}

impl Shared {
    /// Block while paused. Returns false once a stop was requested.
    fn wait_while_paused(&self) -> bool {
        let mut control = lock(&self.control);
        loop {
            if control.stop_requested {
                return false;
            }
            if control.state != PipelineState::Paused {
                return true;
            }
            control = match self.wake.wait_timeout(control, PAUSE_POLL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn update_store(&self, records: &[DetectionRecord]) -> TrajectorySnapshot {
        lock(&self.store).update(records)
    }

    fn record(&self, result: &TickResult) {
        lock(&self.history).record(result);
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_stopped(&self, reason: StopReason) {
        let mut control = lock(&self.control);
        control.state = PipelineState::Stopped;
        control.last_reason = Some(reason);
        self.wake.notify_all();
    }

    fn clear_results(&self) {
        lock(&self.store).clear();
        lock(&self.history).clear();
        self.frames_processed.store(0, Ordering::Relaxed);
    }

    fn begin_run(&self, kind: SourceKind) {
        self.clear_results();
        lock(&self.history).begin_run(kind);
    }
}

/// Drives frames from a source through an inference step into a sink.
///
/// ```no_run
/// use trackflow::{PipelineConfig, ReplayLoader, ModelLoader, SourceSpec, StreamingPipeline, Task};
/// use trackflow::sink::ChannelSink;
///
/// let config = PipelineConfig::default();
/// let model = ReplayLoader.load("detections.jsonl")?;
/// let step = config.build_step(Task::Track, model);
/// let (sink, events) = ChannelSink::unbounded();
///
/// let mut pipeline = StreamingPipeline::new(config);
/// pipeline.start(SourceSpec::ImageSequence("frames/".into()), step, sink)?;
/// for event in events {
///     println!("{event:?}");
/// }
/// # Ok::<(), trackflow::PipelineError>(())
/// ```
pub struct StreamingPipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Default for StreamingPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl StreamingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let shared = Shared {
            control: Mutex::new(Control::default()),
            wake: Condvar::new(),
            store: Mutex::new(TrackIdentityStore::new(&config.trajectory)),
            history: Mutex::new(ResultHistory::new(config.history.clone())),
            frames_processed: AtomicU64::new(0),
        };
        Self {
            config,
            shared: Arc::new(shared),
            handle: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open the source and start the drive thread.
    ///
    /// Fails with `AlreadyRunning` while a run is active, leaving it
    /// untouched. A source that cannot be opened fails the call and leaves
    /// the state as it was. Starting from `Stopped` clears the trajectories
    /// and result history of the previous run.
    pub fn start(
        &mut self,
        opener: impl SourceOpener,
        step: InferenceStep,
        sink: impl ResultSink + 'static,
    ) -> Result<()> {
        if self.state().is_active() {
            return Err(PipelineError::AlreadyRunning);
        }
        self.join();

        let source = opener.open()?;
        self.shared.begin_run(source.kind());
        {
            let mut control = lock(&self.shared.control);
            control.state = PipelineState::Running;
            control.stop_requested = false;
            control.last_reason = None;
        }

        let task = step.task();
        let shared = self.shared.clone();
        let sink: Box<dyn ResultSink> = Box::new(sink);
        let spawned = thread::Builder::new()
            .name("trackflow-drive".to_string())
            .spawn(move || drive::run(shared, source, step, sink));
        match spawned {
            Ok(handle) => {
                info!(?task, "pipeline started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                lock(&self.shared.control).state = PipelineState::Idle;
                Err(PipelineError::Io(err))
            }
        }
    }

    pub fn pause(&self) -> Result<()> {
        self.transition("pause", PipelineState::Running, PipelineState::Paused)
    }

    pub fn resume(&self) -> Result<()> {
        self.transition("resume", PipelineState::Paused, PipelineState::Running)
    }

    fn transition(&self, action: &'static str, from: PipelineState, to: PipelineState) -> Result<()> {
        let mut control = lock(&self.shared.control);
        if control.state != from || control.stop_requested {
            return Err(PipelineError::InvalidStateTransition {
                action,
                state: control.state,
            });
        }
        control.state = to;
        self.shared.wake.notify_all();
        info!(%to, "pipeline {action}d");
        Ok(())
    }

    /// Stop the run and wait until the source, model and sink have been
    /// released. Stopping a stopped pipeline is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let state = self.request_stop();
        if state == PipelineState::Idle {
            return Err(PipelineError::InvalidStateTransition { action: "stop", state });
        }
        self.join();
        Ok(())
    }

    /// Stop any active run, then clear trajectories and history and return
    /// to `Idle`.
    pub fn reset(&mut self) {
        self.request_stop();
        self.join();
        self.shared.clear_results();
        let mut control = lock(&self.shared.control);
        control.state = PipelineState::Idle;
        control.stop_requested = false;
        control.last_reason = None;
        info!("pipeline reset");
    }

    /// Block until the current run ends on its own and return why it ended.
    ///
    /// Never returns for a live source that is not stopped from elsewhere.
    pub fn wait(&mut self) -> Option<StopReason> {
        self.join();
        self.last_stop_reason()
    }

    pub fn state(&self) -> PipelineState {
        lock(&self.shared.control).state
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        lock(&self.shared.control).last_reason.clone()
    }

    /// Owned copy of every live trajectory.
    pub fn trajectories(&self) -> TrajectorySnapshot {
        lock(&self.shared.store).snapshot()
    }

    /// Owned copy of the accumulated results.
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.shared.history).entries().cloned().collect()
    }

    /// Frames that completed inference in the current or last run.
    pub fn frames_processed(&self) -> u64 {
        self.shared.frames_processed.load(Ordering::Relaxed)
    }

    /// Export the accumulated history under `dir`, using the next free
    /// `{base_name}_{n}`.
    pub fn save_results(&self, dir: &Path) -> Result<ExportPaths> {
        let entries = self.history();
        if entries.is_empty() {
            return Err(PipelineError::Export("no results to save".into()));
        }
        let mut export = ExportSink::create(dir, &self.config.export)?;
        for entry in &entries {
            export.write_entry(
                entry.frame_index,
                &entry.records,
                &entry.info_lines,
                entry.annotated.as_deref(),
            )?;
        }
        export.close()?;
        info!(entries = entries.len(), dir = %dir.display(), "results saved");
        Ok(export.paths().clone())
    }

    fn request_stop(&self) -> PipelineState {
        let mut control = lock(&self.shared.control);
        if control.state.is_active() {
            control.stop_requested = true;
            self.shared.wake.notify_all();
        }
        control.state
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("drive thread terminated abnormally");
                lock(&self.shared.control).state = PipelineState::Stopped;
            }
        }
    }
}

impl Drop for StreamingPipeline {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}
