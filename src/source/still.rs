use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::source::{FrameSource, SourceKind};

/// A single image: a sequence of exactly one frame.
#[derive(Debug, Clone)]
pub struct StillImage {
    frame: Option<Frame>,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "opened still image");
        Ok(Self::from_frame(Frame::from_dynamic(image)))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_once() {
        let mut source = StillImage::from_frame(Frame::filled(4, 4, [1, 2, 3]));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = StillImage::open(Path::new("/nonexistent/frame.png")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }
}
