#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use trackflow::inference::{RawDetection, RawModelOutput};
use trackflow::sink::PipelineEvent;
use trackflow::source::SourceKind;
use trackflow::{Frame, FrameSource, Model, ModelError, PipelineError, RunOptions};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn frame() -> Frame {
    Frame::filled(64, 48, [10, 10, 10])
}

/// A finite source over prepared frames.
pub struct VecSource {
    frames: VecDeque<Frame>,
}

impl VecSource {
    pub fn boxed(count: usize) -> Box<dyn FrameSource> {
        Box::new(Self {
            frames: (0..count).map(|_| frame()).collect(),
        })
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> trackflow::Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }
}

/// A source that yields a frame each time the test sends one and ends when
/// the sender is dropped.
pub struct GatedSource {
    rx: Receiver<Frame>,
}

impl FrameSource for GatedSource {
    fn next_frame(&mut self) -> trackflow::Result<Option<Frame>> {
        Ok(self.rx.recv().ok())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }
}

pub fn gated() -> (Sender<Frame>, Box<dyn FrameSource>) {
    let (tx, rx) = unbounded();
    (tx, Box::new(GatedSource { rx }))
}

/// An endless source that produces a frame every few milliseconds, failing
/// to decode on the listed calls.
pub struct TickingSource {
    calls: u64,
    corrupt: Vec<u64>,
    kind: SourceKind,
    interval: Duration,
}

impl TickingSource {
    pub fn live() -> Self {
        Self {
            calls: 0,
            corrupt: Vec::new(),
            kind: SourceKind::Live,
            interval: Duration::from_millis(5),
        }
    }

    pub fn corrupt_at(mut self, calls: &[u64]) -> Self {
        self.corrupt = calls.to_vec();
        self
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn boxed(self) -> Box<dyn FrameSource> {
        Box::new(self)
    }
}

impl FrameSource for TickingSource {
    fn next_frame(&mut self) -> trackflow::Result<Option<Frame>> {
        std::thread::sleep(self.interval);
        let call = self.calls;
        self.calls += 1;
        if self.corrupt.contains(&call) {
            return Err(PipelineError::DecodeError {
                position: call,
                reason: "truncated frame".into(),
            });
        }
        Ok(Some(frame()))
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// A model whose output is computed by a closure from the call number.
pub struct FnModel<F> {
    calls: usize,
    f: F,
}

impl<F> FnModel<F>
where
    F: FnMut(usize) -> Result<RawModelOutput, ModelError> + Send,
{
    pub fn boxed(f: F) -> Box<Self> {
        Box::new(Self { calls: 0, f })
    }
}

impl<F> Model for FnModel<F>
where
    F: FnMut(usize) -> Result<RawModelOutput, ModelError> + Send,
{
    fn run(&mut self, _frame: &Frame, _options: &RunOptions) -> Result<RawModelOutput, ModelError> {
        let call = self.calls;
        self.calls += 1;
        (self.f)(call)
    }
}

/// One confident box, moving right by two pixels per call.
pub fn moving_box(call: usize, track_id: Option<u64>) -> RawModelOutput {
    let x = 10.0 + 2.0 * call as f32;
    RawModelOutput {
        detections: vec![RawDetection {
            bbox: [x, 10.0, x + 20.0, 30.0],
            score: Some(0.9),
            class_id: Some(0),
            track_id,
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Collect events until `Finished` arrives.
pub fn drain(rx: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx.recv_timeout(EVENT_TIMEOUT).expect("pipeline event");
        let finished = matches!(event, PipelineEvent::Finished(_));
        events.push(event);
        if finished {
            return events;
        }
    }
}

/// Frame index of every result and error event, in arrival order.
pub fn indices(events: &[PipelineEvent]) -> Vec<(char, u64)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Result(r) => Some(('r', r.frame_index)),
            PipelineEvent::Error(e) => e.frame_index.map(|i| ('e', i)),
            PipelineEvent::Finished(_) => None,
        })
        .collect()
}
