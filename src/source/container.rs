//! File-backed frame containers.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::source::{DecodePolicy, FrameSource, SourceKind};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Decodes frames out of one container, in order.
pub trait ContainerDecoder: Send {
    /// `None` at end of container. A failed frame yields `Some(Err(_))`.
    fn decode_next(&mut self) -> Option<Result<Frame>>;

    /// True when decoding can continue past a failed frame.
    fn resumable(&self) -> bool;
}

/// A directory of still images treated as one video, in file-name order.
///
/// Every file is decoded independently, so a corrupt file never prevents
/// reading the next one.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let unavailable = |e: std::io::Error| PipelineError::SourceUnavailable(format!("{}: {e}", dir.display()));
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unavailable)? {
            let path = entry.map_err(unavailable)?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();
        debug!(dir = %dir.display(), frames = paths.len(), "opened image sequence");
        Ok(Self { paths, position: 0 })
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl ContainerDecoder for ImageSequence {
    fn decode_next(&mut self) -> Option<Result<Frame>> {
        let path = self.paths.get(self.position)?;
        let position = self.position as u64;
        self.position += 1;
        Some(
            image::open(path)
                .map(Frame::from_dynamic)
                .map_err(|e| PipelineError::DecodeError {
                    position,
                    reason: format!("{}: {e}", path.display()),
                }),
        )
    }

    fn resumable(&self) -> bool {
        true
    }
}

/// A finite frame source backed by a container decoder.
#[derive(Debug)]
pub struct FileStream<D> {
    decoder: D,
    finished: bool,
}

impl<D: ContainerDecoder> FileStream<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            finished: false,
        }
    }
}

impl<D: ContainerDecoder> FrameSource for FileStream<D> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        match self.decoder.decode_next() {
            None => {
                self.finished = true;
                Ok(None)
            }
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => {
                if !self.decoder.resumable() {
                    self.finished = true;
                }
                warn!(error = %err, "container decode failed");
                Err(err)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn decode_policy(&self) -> DecodePolicy {
        if self.decoder.resumable() {
            DecodePolicy::Skip
        } else {
            DecodePolicy::End
        }
    }
}
