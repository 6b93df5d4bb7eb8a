//! The producer thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::annotate;
use crate::error::PipelineError;
use crate::inference::InferenceStep;
use crate::pipeline::Shared;
use crate::sink::{ErrorEvent, ResultSink, StopReason, TickResult};
use crate::source::{DecodePolicy, FrameSource};

/// Body of the drive thread. Owns the source, the step and the sink; each is
/// dropped exactly once before the pipeline is marked stopped.
pub(super) fn run(
    shared: Arc<Shared>,
    mut source: Box<dyn FrameSource>,
    mut step: InferenceStep,
    mut sink: Box<dyn ResultSink>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        drive(&shared, source.as_mut(), &mut step, sink.as_mut())
    }));
    let reason = outcome.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!(%message, "drive loop panicked");
        StopReason::Panicked(message)
    });
    drop(source);
    drop(step);

    let finished = panic::catch_unwind(AssertUnwindSafe(move || {
        sink.finish(&reason);
        drop(sink);
        reason
    }));
    let reason = finished.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!(%message, "sink panicked while finishing");
        StopReason::Panicked(message)
    });
    info!(%reason, "pipeline stopped");
    shared.mark_stopped(reason);
}

fn drive(
    shared: &Shared,
    source: &mut dyn FrameSource,
    step: &mut InferenceStep,
    sink: &mut dyn ResultSink,
) -> StopReason {
    let policy = source.decode_policy();
    let mut frame_index: u64 = 0;
    loop {
        if !shared.wait_while_paused() {
            return StopReason::Stopped;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(frame_index, "end of stream");
                return StopReason::EndOfStream;
            }
            Err(err @ PipelineError::DecodeError { .. }) => {
                warn!(frame_index, error = %err, "frame decode failed");
                sink.emit_error(ErrorEvent::from_error(Some(frame_index), &err));
                frame_index += 1;
                match policy {
                    DecodePolicy::Skip => continue,
                    DecodePolicy::End => return StopReason::EndOfStream,
                }
            }
            Err(err) => {
                error!(frame_index, error = %err, "source failed");
                sink.emit_error(ErrorEvent::from_error(Some(frame_index), &err));
                return StopReason::SourceFailed(err.to_string());
            }
        };

        let started = Instant::now();
        match step.run(&frame, frame_index) {
            Ok(output) => {
                let inference_time = started.elapsed();
                let trajectories = shared.update_store(&output.records);
                let mut annotated = output.annotated;
                annotate::draw_trajectories(&mut annotated, &trajectories);
                let result = TickResult {
                    frame_index,
                    timestamp: Local::now(),
                    inference_time,
                    frame: Arc::new(frame),
                    annotated: Arc::new(annotated),
                    records: output.records,
                    trajectories,
                };
                shared.record(&result);
                sink.emit(result);
            }
            Err(err) => {
                warn!(frame_index, error = %err, "inference failed");
                sink.emit_error(ErrorEvent::from_error(Some(frame_index), &err));
            }
        }
        frame_index += 1;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
