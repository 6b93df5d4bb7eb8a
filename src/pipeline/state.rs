use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`StreamingPipeline`](crate::pipeline::StreamingPipeline).
///
/// `Idle -start-> Running <-pause/resume-> Paused`, and either of the active
/// states goes to `Stopped` on stop, end of stream or a fatal source error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl PipelineState {
    /// Running or Paused.
    pub fn is_active(self) -> bool {
        matches!(self, PipelineState::Running | PipelineState::Paused)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Paused => "paused",
            PipelineState::Stopped => "stopped",
        })
    }
}
