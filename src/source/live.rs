//! Live capture devices.
//!
//! A device index can be held by one `LiveStream` at a time, process-wide.
//! The claim is released when the stream is dropped.

use std::collections::HashSet;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::source::{FrameSource, SourceKind};

static CLAIMED_DEVICES: Lazy<Mutex<HashSet<u32>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// An opened capture device.
pub trait CaptureDevice: Send {
    /// `Ok(None)` when the device has no more frames to give.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Close the device. Called exactly once.
    fn release(&mut self);
}

/// Opens capture devices by index.
pub trait CaptureBackend: Send + Sync {
    /// Fails with `SourceUnavailable`.
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>>;
}

/// Exclusive process-wide claim on a device index.
#[derive(Debug)]
pub struct DeviceClaim {
    index: u32,
}

impl DeviceClaim {
    pub fn acquire(index: u32) -> Result<Self> {
        let mut claimed = CLAIMED_DEVICES.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(index) {
            return Err(PipelineError::SourceUnavailable(format!(
                "capture device {index} is already in use"
            )));
        }
        Ok(Self { index })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// True while some claim on `index` is alive.
    pub fn is_claimed(index: u32) -> bool {
        CLAIMED_DEVICES
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&index)
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        CLAIMED_DEVICES
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.index);
    }
}

/// An unbounded frame source reading from a capture device.
pub struct LiveStream {
    device: Option<Box<dyn CaptureDevice>>,
    claim: Option<DeviceClaim>,
}

impl LiveStream {
    pub fn open(backend: &dyn CaptureBackend, index: u32) -> Result<Self> {
        let claim = DeviceClaim::acquire(index)?;
        let device = backend.open(index)?;
        info!(index, "capture device opened");
        Ok(Self {
            device: Some(device),
            claim: Some(claim),
        })
    }

    /// Release the device and its claim. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
        }
        if let Some(claim) = self.claim.take() {
            info!(index = claim.index(), "capture device released");
        }
    }
}

impl FrameSource for LiveStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(device) = self.device.as_mut() else {
            return Ok(None);
        };
        let frame = device.read_frame();
        if let Err(err) = &frame {
            warn!(error = %err, "capture read failed");
        }
        frame
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDevice {
        releases: Arc<AtomicUsize>,
    }

    impl CaptureDevice for CountingDevice {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            Ok(Some(Frame::filled(2, 2, [9, 9, 9])))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingBackend {
        releases: Arc<AtomicUsize>,
    }

    impl CaptureBackend for CountingBackend {
        fn open(&self, _index: u32) -> Result<Box<dyn CaptureDevice>> {
            Ok(Box::new(CountingDevice {
                releases: self.releases.clone(),
            }))
        }
    }

    struct MissingBackend;

    impl CaptureBackend for MissingBackend {
        fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>> {
            Err(PipelineError::SourceUnavailable(format!("no device {index}")))
        }
    }

    #[test]
    fn test_claim_is_exclusive() {
        let claim = DeviceClaim::acquire(9001).unwrap();
        assert!(DeviceClaim::acquire(9001).is_err());
        drop(claim);
        assert!(DeviceClaim::acquire(9001).is_ok());
    }

    #[test]
    fn test_release_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            releases: releases.clone(),
        };
        let mut stream = LiveStream::open(&backend, 9002).unwrap();
        assert!(stream.next_frame().unwrap().is_some());
        stream.release();
        assert!(!DeviceClaim::is_claimed(9002));
        assert!(stream.next_frame().unwrap().is_none());
        drop(stream);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_keeps_device_free() {
        assert!(LiveStream::open(&MissingBackend, 9003).is_err());
        assert!(!DeviceClaim::is_claimed(9003));
    }
}
