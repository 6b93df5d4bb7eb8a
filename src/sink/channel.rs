use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use crate::sink::{ErrorEvent, ResultSink, StopReason, TickResult};

/// What a [`ChannelSink`] forwards to its receiver.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Result(TickResult),
    Error(ErrorEvent),
    Finished(StopReason),
}

/// Forwards events over an unbounded channel so the producer never blocks.
///
/// Once the receiver is dropped, events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PipelineEvent>,
    disconnected: bool,
}

impl ChannelSink {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self {
            tx,
            disconnected: false,
        }
    }

    pub fn unbounded() -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    fn send(&mut self, event: PipelineEvent) {
        if self.tx.send(event).is_err() && !self.disconnected {
            self.disconnected = true;
            debug!("result receiver dropped, discarding events");
        }
    }
}

impl ResultSink for ChannelSink {
    fn emit(&mut self, result: TickResult) {
        self.send(PipelineEvent::Result(result));
    }

    fn emit_error(&mut self, event: ErrorEvent) {
        self.send(PipelineEvent::Error(event));
    }

    fn finish(&mut self, reason: &StopReason) {
        self.send(PipelineEvent::Finished(reason.clone()));
    }
}

/// Fans every event out to several sinks, in insertion order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ResultSink + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: impl ResultSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for MultiSink {
    fn emit(&mut self, result: TickResult) {
        if let Some((last, rest)) = self.sinks.split_last_mut() {
            for sink in rest {
                sink.emit(result.clone());
            }
            last.emit(result);
        }
    }

    fn emit_error(&mut self, event: ErrorEvent) {
        for sink in &mut self.sinks {
            sink.emit_error(event.clone());
        }
    }

    fn finish(&mut self, reason: &StopReason) {
        for sink in &mut self.sinks {
            sink.finish(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ErrorKind;

    fn event(index: u64) -> ErrorEvent {
        ErrorEvent {
            frame_index: Some(index),
            kind: ErrorKind::Inference,
            message: "boom".into(),
        }
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (mut sink, rx) = ChannelSink::unbounded();
        sink.emit_error(event(0));
        sink.emit_error(event(1));
        sink.finish(&StopReason::Stopped);

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 3);
        assert!(matches!(&got[0], PipelineEvent::Error(e) if e.frame_index == Some(0)));
        assert!(matches!(&got[1], PipelineEvent::Error(e) if e.frame_index == Some(1)));
        assert!(matches!(&got[2], PipelineEvent::Finished(StopReason::Stopped)));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (mut sink, rx) = ChannelSink::unbounded();
        drop(rx);
        sink.emit_error(event(0));
        sink.finish(&StopReason::EndOfStream);
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let (a, rx_a) = ChannelSink::unbounded();
        let (b, rx_b) = ChannelSink::unbounded();
        let mut multi = MultiSink::new().with(a).with(b);
        assert_eq!(multi.len(), 2);
        multi.emit_error(event(5));
        multi.finish(&StopReason::EndOfStream);
        assert_eq!(rx_a.try_iter().count(), 2);
        assert_eq!(rx_b.try_iter().count(), 2);
    }
}
