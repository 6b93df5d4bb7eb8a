//! Top-level configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::inference::{InferenceStep, Model, RunOptions, Task};
use crate::pipeline::HistoryConfig;
use crate::sink::ExportConfig;
use crate::tracker::TrackerConfig;
use crate::trajectory::{Palette, TrajectoryConfig};

/// Every tunable of a pipeline. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub trajectory: TrajectoryConfig,
    pub tracker: TrackerConfig,
    pub run: RunOptions,
    pub export: ExportConfig,
    pub history: HistoryConfig,
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PipelineError::Config(msg.to_string()));
        if !(0.0..=1.0).contains(&self.run.confidence_threshold) {
            return invalid("run.confidence_threshold must be within [0, 1]");
        }
        if self.trajectory.max_len == 0 {
            return invalid("trajectory.max_len must be positive");
        }
        if self.trajectory.palette_size == 0 {
            return invalid("trajectory.palette_size must be positive");
        }
        if self.export.fps == 0 {
            return invalid("export.fps must be positive");
        }
        if self.export.base_name.is_empty() {
            return invalid("export.base_name must not be empty");
        }
        if self.tracker.low_thresh > self.tracker.track_thresh {
            return invalid("tracker.low_thresh must not exceed tracker.track_thresh");
        }
        if self.history.max_entries == Some(0) {
            return invalid("history.max_entries must be positive when set");
        }
        if self.history.live_max_entries == 0 {
            return invalid("history.live_max_entries must be positive");
        }
        Ok(())
    }

    /// An inference step using this configuration's run options, tracker
    /// settings and palette.
    pub fn build_step(&self, task: Task, model: Box<dyn Model>) -> InferenceStep {
        InferenceStep::new(task, model, self.run.clone())
            .with_tracker_config(self.tracker.clone())
            .with_palette(Palette::from_config(&self.trajectory))
    }
}
