//! Frame sources: a still image, a file-backed frame container, or a live
//! capture device, all pulled one frame at a time.

mod container;
mod live;
mod still;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::frame::Frame;

pub use container::{ContainerDecoder, FileStream, ImageSequence};
pub use live::{CaptureBackend, CaptureDevice, DeviceClaim, LiveStream};
pub use still::StillImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Static,
    File,
    Live,
}

/// What the drive loop does after a `DecodeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Report the error and pull the next frame.
    Skip,
    /// Report the error and treat it as end of sequence.
    End,
}

/// A pull-based, possibly infinite sequence of frames.
///
/// Restarting means constructing a new source. Releasing the underlying
/// device or file happens on drop.
pub trait FrameSource: Send {
    /// `Ok(None)` marks the end of the sequence and is not an error.
    ///
    /// Fails with `DecodeError` for a corrupt frame.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn kind(&self) -> SourceKind;

    fn decode_policy(&self) -> DecodePolicy {
        match self.kind() {
            SourceKind::Live => DecodePolicy::Skip,
            SourceKind::Static | SourceKind::File => DecodePolicy::End,
        }
    }
}

/// Something the pipeline can open into a source when a run starts.
pub trait SourceOpener {
    /// Fails with `SourceUnavailable`.
    fn open(self) -> Result<Box<dyn FrameSource>>;
}

impl SourceOpener for Box<dyn FrameSource> {
    fn open(self) -> Result<Box<dyn FrameSource>> {
        Ok(self)
    }
}

/// Built-in source descriptions.
#[derive(Clone)]
pub enum SourceSpec {
    Image(PathBuf),
    /// A directory of image files read in file-name order.
    ImageSequence(PathBuf),
    Camera {
        index: u32,
        backend: Arc<dyn CaptureBackend>,
    },
}

impl std::fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(path) => f.debug_tuple("Image").field(path).finish(),
            Self::ImageSequence(path) => f.debug_tuple("ImageSequence").field(path).finish(),
            Self::Camera { index, .. } => f.debug_struct("Camera").field("index", index).finish(),
        }
    }
}

impl SourceOpener for SourceSpec {
    fn open(self) -> Result<Box<dyn FrameSource>> {
        Ok(match self {
            SourceSpec::Image(path) => Box::new(StillImage::open(&path)?),
            SourceSpec::ImageSequence(dir) => Box::new(FileStream::new(ImageSequence::open(&dir)?)),
            SourceSpec::Camera { index, backend } => Box::new(LiveStream::open(backend.as_ref(), index)?),
        })
    }
}
