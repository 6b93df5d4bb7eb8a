//! One model invocation per frame, normalized into `DetectionRecord`s.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotate;
use crate::detection::{BoundingBox, DetectionRecord};
use crate::error::{ModelError, PipelineError, Result};
use crate::frame::Frame;
use crate::inference::model::{BoxFormat, Model, RawDetection, RawModelOutput, RunOptions};
use crate::tracker::{ByteTracker, Detection, TrackerConfig};
use crate::trajectory::Palette;

/// Capability of the wrapped model, fixed when the step is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Detect,
    Segment,
    Pose,
    Track,
    /// Keypoints only: no class, no confidence.
    LandmarkOnly,
}

/// Normalized result of one step.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// In the model's per-call order.
    pub records: Vec<DetectionRecord>,
    pub annotated: Frame,
}

/// Wraps one model handle for the lifetime of a pipeline run.
///
/// In `Track` mode the step owns a ByteTracker, so identity state never
/// leaks between runs.
pub struct InferenceStep {
    task: Task,
    model: Box<dyn Model>,
    options: RunOptions,
    tracker: Option<ByteTracker>,
    palette: Palette,
}

impl InferenceStep {
    pub fn new(task: Task, model: Box<dyn Model>, options: RunOptions) -> Self {
        let tracker = (task == Task::Track).then(|| ByteTracker::new(TrackerConfig::default()));
        Self {
            task,
            model,
            options,
            tracker,
            palette: Palette::default(),
        }
    }

    /// Replace the tracker configuration (Track mode only).
    pub fn with_tracker_config(mut self, config: TrackerConfig) -> Self {
        if self.task == Task::Track {
            self.tracker = Some(ByteTracker::new(config));
        }
        self
    }

    /// Colors used when drawing boxes.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Forget all tracker state.
    pub fn reset(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
    }

    /// Run the model on `frame`.
    ///
    /// Every failure is reported as `InferenceFailed`; nothing is retried.
    pub fn run(&mut self, frame: &Frame, frame_index: u64) -> Result<InferenceOutput> {
        let failed = |cause| PipelineError::InferenceFailed { frame_index, cause };
        if frame.is_empty() {
            return Err(failed(ModelError::InvalidInput(format!(
                "empty frame {}x{}",
                frame.width(),
                frame.height()
            ))));
        }
        if !self.model.is_loaded() {
            return Err(failed(ModelError::NotLoaded));
        }

        let RawModelOutput {
            format,
            detections,
            annotated,
        } = self.model.run(frame, &self.options).map_err(failed)?;

        let mut records = normalize(self.task, format, detections, self.options.confidence_threshold);
        if self.task == Task::Track {
            self.assign_identities(&mut records);
        }
        debug!(frame_index, count = records.len(), "inference step");

        let annotated =
            annotated.unwrap_or_else(|| annotate::draw_detections(frame, &records, &self.palette));
        Ok(InferenceOutput { records, annotated })
    }

    fn assign_identities(&mut self, records: &mut [DetectionRecord]) {
        // A model running its own tracker wins over ours
        if records.iter().any(|r| r.track_id.is_some()) {
            return;
        }
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        if !self.options.persist {
            tracker.reset();
        }
        let inputs: Vec<Detection> = records
            .iter()
            .map(|r| Detection {
                bbox: r.bbox,
                score: r.confidence.unwrap_or(1.0),
            })
            .collect();
        for (record, id) in records.iter_mut().zip(tracker.update(&inputs)) {
            record.track_id = id;
        }
    }
}

/// Convert raw detections into records for `task`, dropping those below
/// `threshold`. Records without a score are never filtered.
pub fn normalize(
    task: Task,
    format: BoxFormat,
    detections: Vec<RawDetection>,
    threshold: f32,
) -> Vec<DetectionRecord> {
    detections
        .into_iter()
        .filter(|d| task == Task::LandmarkOnly || d.score.is_none_or(|s| s >= threshold))
        .filter_map(|d| {
            let [a, b, c, e] = d.bbox;
            let bbox = match format {
                BoxFormat::Xyxy => BoundingBox::new(a, b, c, e),
                BoxFormat::Cxcywh => BoundingBox::from_cxcywh(a, b, c, e),
            };
            let confidence = d.score.map(|s| s.clamp(0.0, 1.0));
            let record = match task {
                Task::Detect => DetectionRecord {
                    bbox,
                    class_id: d.class_id,
                    confidence,
                    ..Default::default()
                },
                Task::Track => DetectionRecord {
                    bbox,
                    class_id: d.class_id,
                    confidence,
                    track_id: d.track_id,
                    ..Default::default()
                },
                Task::Segment => DetectionRecord {
                    bbox,
                    polygon: d.polygon,
                    class_id: d.class_id,
                    confidence,
                    ..Default::default()
                },
                Task::Pose => DetectionRecord {
                    bbox,
                    keypoints: d.keypoints,
                    class_id: d.class_id,
                    confidence,
                    ..Default::default()
                },
                Task::LandmarkOnly => {
                    let keypoints = d.keypoints.filter(|k| !k.is_empty())?;
                    DetectionRecord {
                        bbox: BoundingBox::enclosing(&keypoints)?,
                        keypoints: Some(keypoints),
                        ..Default::default()
                    }
                }
            };
            Some(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point;

    struct FixedModel {
        output: RawModelOutput,
    }

    impl Model for FixedModel {
        fn run(&mut self, _frame: &Frame, _options: &RunOptions) -> std::result::Result<RawModelOutput, ModelError> {
            Ok(self.output.clone())
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn run(&mut self, _frame: &Frame, _options: &RunOptions) -> std::result::Result<RawModelOutput, ModelError> {
            Err(ModelError::Backend("device lost".into()))
        }
    }

    fn raw(bbox: [f32; 4], score: Option<f32>) -> RawDetection {
        RawDetection {
            bbox,
            score,
            class_id: Some(0),
            ..Default::default()
        }
    }

    fn frame() -> Frame {
        Frame::filled(320, 240, [0, 0, 0])
    }

    #[test]
    fn test_threshold_and_order() {
        let dets = vec![
            raw([0.0, 0.0, 10.0, 10.0], Some(0.9)),
            raw([5.0, 5.0, 15.0, 15.0], Some(0.1)),
            raw([20.0, 20.0, 30.0, 30.0], Some(0.5)),
        ];
        let records = normalize(Task::Detect, BoxFormat::Xyxy, dets, 0.25);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].confidence, Some(0.9));
        assert_eq!(records[1].bbox.x1, 20.0);
    }

    #[test]
    fn test_landmarks_have_no_class_or_confidence() {
        let det = RawDetection {
            keypoints: Some(vec![Point::new(4.0, 8.0), Point::new(12.0, 2.0)]),
            class_id: Some(3),
            score: Some(0.01),
            ..Default::default()
        };
        let records = normalize(Task::LandmarkOnly, BoxFormat::Xyxy, vec![det], 0.5);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confidence, None);
        assert_eq!(records[0].class_id, None);
        assert_eq!(records[0].bbox.to_array(), [4.0, 2.0, 12.0, 8.0]);
    }

    #[test]
    fn test_cxcywh_boxes() {
        let records = normalize(
            Task::Detect,
            BoxFormat::Cxcywh,
            vec![raw([50.0, 50.0, 20.0, 10.0], Some(0.8))],
            0.25,
        );
        assert_eq!(records[0].bbox.to_array(), [40.0, 45.0, 60.0, 55.0]);
    }

    #[test]
    fn test_detect_strips_identities() {
        let mut det = raw([0.0, 0.0, 10.0, 10.0], Some(0.9));
        det.track_id = Some(8);
        let records = normalize(Task::Detect, BoxFormat::Xyxy, vec![det], 0.25);
        assert_eq!(records[0].track_id, None);
    }

    #[test]
    fn test_track_assigns_stable_ids() {
        let model = FixedModel {
            output: RawModelOutput {
                detections: vec![raw([10.0, 10.0, 50.0, 50.0], Some(0.9))],
                ..Default::default()
            },
        };
        let mut step = InferenceStep::new(Task::Track, Box::new(model), RunOptions::default());
        let first = step.run(&frame(), 0).unwrap();
        let second = step.run(&frame(), 1).unwrap();
        assert_eq!(first.records[0].track_id, Some(1));
        assert_eq!(second.records[0].track_id, Some(1));
    }

    #[test]
    fn test_track_without_persist_restarts_each_call() {
        let model = FixedModel {
            output: RawModelOutput {
                detections: vec![raw([10.0, 10.0, 50.0, 50.0], Some(0.9))],
                ..Default::default()
            },
        };
        let options = RunOptions {
            persist: false,
            ..Default::default()
        };
        let mut step = InferenceStep::new(Task::Track, Box::new(model), options);
        for i in 0..3 {
            let out = step.run(&frame(), i).unwrap();
            assert_eq!(out.records[0].track_id, Some(1));
        }
    }

    #[test]
    fn test_model_identities_are_kept() {
        let mut det = raw([10.0, 10.0, 50.0, 50.0], Some(0.9));
        det.track_id = Some(42);
        let model = FixedModel {
            output: RawModelOutput {
                detections: vec![det],
                ..Default::default()
            },
        };
        let mut step = InferenceStep::new(Task::Track, Box::new(model), RunOptions::default());
        assert_eq!(step.run(&frame(), 0).unwrap().records[0].track_id, Some(42));
    }

    #[test]
    fn test_failures_are_wrapped() {
        let mut step = InferenceStep::new(Task::Detect, Box::new(FailingModel), RunOptions::default());
        match step.run(&frame(), 7) {
            Err(PipelineError::InferenceFailed { frame_index, .. }) => assert_eq!(frame_index, 7),
            other => panic!("unexpected {other:?}"),
        }

        let empty = Frame::filled(0, 0, [0, 0, 0]);
        assert!(matches!(
            step.run(&empty, 8),
            Err(PipelineError::InferenceFailed { cause: ModelError::InvalidInput(_), .. })
        ));
    }
}
