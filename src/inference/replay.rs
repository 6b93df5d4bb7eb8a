//! Replays recorded model output, one JSON line per frame.
//!
//! Each line looks like
//! `{"format": "xyxy", "detections": [{"bbox": [x1, y1, x2, y2], "score": 0.9, "class_id": 0}]}`.
//! Blank lines are skipped. Once the recording runs out every call returns
//! an empty output.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};

use serde::Deserialize;
use tracing::info;

use crate::error::{ModelError, PipelineError, Result};
use crate::frame::Frame;
use crate::inference::model::{BoxFormat, Model, ModelLoader, RawDetection, RawModelOutput, RunOptions};

#[derive(Debug, Deserialize)]
struct ReplayLine {
    #[serde(default)]
    format: BoxFormat,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayModel {
    outputs: VecDeque<RawModelOutput>,
}

impl ReplayModel {
    pub fn new(outputs: impl IntoIterator<Item = RawModelOutput>) -> Self {
        Self {
            outputs: outputs.into_iter().collect(),
        }
    }

    /// Parse a JSON-lines recording.
    pub fn from_reader(reader: impl BufRead) -> std::result::Result<Self, String> {
        let mut outputs = VecDeque::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| e.to_string())?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ReplayLine =
                serde_json::from_str(&line).map_err(|e| format!("line {}: {e}", number + 1))?;
            outputs.push_back(RawModelOutput {
                format: parsed.format,
                detections: parsed.detections,
                annotated: None,
            });
        }
        Ok(Self { outputs })
    }

    /// Recorded frames not yet replayed.
    pub fn remaining(&self) -> usize {
        self.outputs.len()
    }
}

impl Model for ReplayModel {
    fn run(&mut self, _frame: &Frame, options: &RunOptions) -> std::result::Result<RawModelOutput, ModelError> {
        let mut output = self.outputs.pop_front().unwrap_or_default();
        output
            .detections
            .retain(|d| d.score.is_none_or(|s| s >= options.confidence_threshold));
        Ok(output)
    }
}

/// Loads `ReplayModel`s from files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayLoader;

impl ModelLoader for ReplayLoader {
    fn load(&self, locator: &str) -> Result<Box<dyn Model>> {
        let load_error = |reason: String| PipelineError::ModelLoadError {
            locator: locator.to_string(),
            reason,
        };
        let file = File::open(locator).map_err(|e| load_error(e.to_string()))?;
        let model = ReplayModel::from_reader(BufReader::new(file)).map_err(load_error)?;
        info!(locator, frames = model.remaining(), "loaded replay model");
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let text = r#"{"detections": [{"bbox": [0, 0, 10, 10], "score": 0.9, "class_id": 1}]}

{"format": "cxcywh", "detections": [{"bbox": [5, 5, 10, 10], "track_id": 3}]}
{}
"#;
        let mut model = ReplayModel::from_reader(text.as_bytes()).unwrap();
        assert_eq!(model.remaining(), 3);

        let frame = Frame::filled(8, 8, [0, 0, 0]);
        let options = RunOptions::default();
        let first = model.run(&frame, &options).unwrap();
        assert_eq!(first.detections[0].class_id, Some(1));

        let second = model.run(&frame, &options).unwrap();
        assert_eq!(second.format, BoxFormat::Cxcywh);
        assert_eq!(second.detections[0].track_id, Some(3));
        assert_eq!(second.detections[0].score, None);

        assert!(model.run(&frame, &options).unwrap().detections.is_empty());
        assert!(model.run(&frame, &options).unwrap().detections.is_empty());
    }

    #[test]
    fn test_bad_line_is_reported() {
        let err = ReplayModel::from_reader("{\"detections\": 5}".as_bytes()).unwrap_err();
        assert!(err.starts_with("line 1"));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = ReplayLoader.load("/nonexistent/replay.jsonl").err().unwrap();
        assert!(matches!(err, PipelineError::ModelLoadError { .. }));
    }
}
