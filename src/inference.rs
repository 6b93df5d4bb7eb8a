//! Model collaborators and the per-frame inference step.
//!
//! Any backend (ONNX Runtime, Burn, a remote service) plugs in by
//! implementing [`Model`]. [`InferenceStep`] normalizes its output into
//! [`DetectionRecord`](crate::detection::DetectionRecord)s and, in `Track`
//! mode, assigns identities.

mod model;
mod replay;
mod step;

pub use model::{BoxFormat, Model, ModelLoader, RawDetection, RawModelOutput, RunOptions};
pub use replay::{ReplayLoader, ReplayModel};
pub use step::{InferenceOutput, InferenceStep, Task, normalize};
