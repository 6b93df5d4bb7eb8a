//! Consumer side of the pipeline.
//!
//! The drive loop hands every tick to a [`ResultSink`] in frame-arrival
//! order. Sinks must return quickly; anything slow belongs behind a
//! [`ChannelSink`].

mod channel;
mod export;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::trajectory::TrajectorySnapshot;

pub use channel::{ChannelSink, MultiSink, PipelineEvent};
pub use export::{CoordinateLog, ExportConfig, ExportPaths, ExportSink, FrameSequenceWriter, coordinate_line};

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Position in the source sequence, counting frames that failed to decode.
    pub frame_index: u64,
    pub timestamp: DateTime<Local>,
    pub inference_time: Duration,
    pub frame: Arc<Frame>,
    pub annotated: Arc<Frame>,
    pub records: Vec<DetectionRecord>,
    pub trajectories: TrajectorySnapshot,
}

impl TickResult {
    /// Human readable summary: an object count line, then one trajectory line
    /// per identified record.
    pub fn info_lines(&self) -> Vec<String> {
        info_lines(self.frame_index, &self.records, &self.trajectories)
    }
}

pub(crate) fn info_lines(
    frame_index: u64,
    records: &[DetectionRecord],
    trajectories: &TrajectorySnapshot,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(format!("Frame{frame_index}: objects={}", records.len()));
    for id in records.iter().filter_map(|r| r.track_id) {
        let points = trajectories
            .get(&id)
            .map(|t| {
                t.points()
                    .map(|p| format!("({:.0}, {:.0})", p.x, p.y))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        lines.push(format!("ID {id} trajectory: [{points}]"));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Decode,
    Inference,
    Source,
}

/// A recovered per-tick failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub frame_index: Option<u64>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEvent {
    pub fn from_error(frame_index: Option<u64>, err: &PipelineError) -> Self {
        let kind = match err {
            PipelineError::DecodeError { .. } => ErrorKind::Decode,
            PipelineError::InferenceFailed { .. } => ErrorKind::Inference,
            _ => ErrorKind::Source,
        };
        Self {
            frame_index,
            kind,
            message: err.to_string(),
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Stopped,
    SourceFailed(String),
    Panicked(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => f.write_str("end of stream"),
            StopReason::Stopped => f.write_str("stopped"),
            StopReason::SourceFailed(reason) => write!(f, "source failed: {reason}"),
            StopReason::Panicked(reason) => write!(f, "drive loop panicked: {reason}"),
        }
    }
}

pub trait ResultSink: Send {
    fn emit(&mut self, result: TickResult);

    fn emit_error(&mut self, event: ErrorEvent);

    /// Called exactly once per run, after the last `emit`.
    fn finish(&mut self, _reason: &StopReason) {}
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn emit(&mut self, result: TickResult) {
        (**self).emit(result)
    }

    fn emit_error(&mut self, event: ErrorEvent) {
        (**self).emit_error(event)
    }

    fn finish(&mut self, reason: &StopReason) {
        (**self).finish(reason)
    }
}
