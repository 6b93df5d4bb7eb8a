//! Streaming inference-and-tracking pipeline.
//!
//! Frames are pulled from a [`FrameSource`](source::FrameSource), run through
//! a pluggable [`Model`] by an [`InferenceStep`], given stable identities by
//! ByteTrack, kept as bounded per-identity trajectories in a
//! [`TrackIdentityStore`], and handed to a [`ResultSink`](sink::ResultSink)
//! from a dedicated producer thread owned by [`StreamingPipeline`].

pub mod annotate;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod inference;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod tracker;
pub mod trajectory;

pub use config::PipelineConfig;
pub use detection::{BoundingBox, DetectionBuilder, DetectionRecord, Point, TrackId};
pub use error::{ModelError, PipelineError, Result};
pub use frame::Frame;
pub use inference::{InferenceOutput, InferenceStep, Model, ModelLoader, ReplayLoader, ReplayModel, RunOptions, Task};
pub use pipeline::{PipelineState, StreamingPipeline};
pub use sink::{ErrorEvent, ResultSink, StopReason, TickResult};
pub use source::{FrameSource, SourceSpec};
pub use tracker::{ByteTracker, Detection, TrackerConfig};
pub use trajectory::{Palette, TrackIdentityStore, Trajectory, TrajectoryConfig, TrajectorySnapshot};
