//! Error taxonomy shared by sources, inference, the pipeline and exporters.

use thiserror::Error;

use crate::pipeline::PipelineState;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the pipeline and its collaborators.
///
/// `DecodeError` and `InferenceFailed` are per-tick errors: the drive loop
/// recovers from them and reports them to the sink. The rest abort whatever
/// operation returned them.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The device, file or directory behind a source cannot be opened.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// One frame could not be decoded.
    #[error("failed to decode frame at position {position}: {reason}")]
    DecodeError { position: u64, reason: String },

    /// One model invocation failed.
    #[error("inference failed on frame {frame_index}: {cause}")]
    InferenceFailed {
        frame_index: u64,
        #[source]
        cause: ModelError,
    },

    /// A model could not be loaded from its locator.
    #[error("failed to load model from `{locator}`: {reason}")]
    ModelLoadError { locator: String, reason: String },

    #[error("pipeline is already running")]
    AlreadyRunning,

    #[error("cannot {action} a pipeline that is {state}")]
    InvalidStateTransition {
        action: &'static str,
        state: PipelineState,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error reported by a model collaborator for a single call.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Backend(String),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Export(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}
