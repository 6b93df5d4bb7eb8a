//! Contract between the pipeline and external model backends.

use serde::{Deserialize, Serialize};

use crate::detection::{Point, TrackId};
use crate::error::{ModelError, Result};
use crate::frame::Frame;

/// Per-call options handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub confidence_threshold: f32,
    /// Reuse tracker state across calls on the same stream.
    pub persist: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            persist: true,
        }
    }
}

/// Layout of `RawDetection::bbox`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// [x1, y1, x2, y2]
    #[default]
    Xyxy,
    /// [center_x, center_y, width, height]
    Cxcywh,
}

/// Raw per-object model output before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    pub score: Option<f32>,
    pub class_id: Option<u32>,
    /// Present only when the model runs its own tracker.
    pub track_id: Option<TrackId>,
    pub keypoints: Option<Vec<Point>>,
    pub polygon: Option<Vec<Point>>,
}

/// Everything one model call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawModelOutput {
    pub format: BoxFormat,
    pub detections: Vec<RawDetection>,
    /// The model's own rendering, if it draws one.
    pub annotated: Option<Frame>,
}

/// A loaded model.
///
/// Implement this trait to connect any detector, segmenter, pose or landmark
/// backend to the pipeline.
///
/// # Example
///
/// ```ignore
/// use trackflow::inference::{Model, RawModelOutput, RunOptions};
///
/// struct MyDetector { /* backend session */ }
///
/// impl Model for MyDetector {
///     fn run(&mut self, frame: &Frame, options: &RunOptions) -> Result<RawModelOutput, ModelError> {
///         Ok(RawModelOutput::default())
///     }
/// }
/// ```
pub trait Model: Send {
    /// Run the model on one frame.
    fn run(&mut self, frame: &Frame, options: &RunOptions) -> std::result::Result<RawModelOutput, ModelError>;

    /// False once the backend has lost its weights or session.
    fn is_loaded(&self) -> bool {
        true
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn run(&mut self, frame: &Frame, options: &RunOptions) -> std::result::Result<RawModelOutput, ModelError> {
        (**self).run(frame, options)
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }
}

/// Creates models from a weights locator (path, URL, registry key).
pub trait ModelLoader {
    /// Fails with `ModelLoadError`.
    fn load(&self, locator: &str) -> Result<Box<dyn Model>>;
}
