//! Event bus — emit-and-flush dispatch with pluggable sinks.
//!
//! Events queue on a `std::sync::mpsc` channel and reach sinks on
//! `flush()`, so metric writes stay append-only and strictly ordered by
//! emission even when a sink does file I/O.

use std::sync::mpsc;

use crate::events::MetricEvent;
use crate::sinks::MetricSink;

/// Broadcast bus for metric events.
pub struct EventBus {
    sender: mpsc::Sender<MetricEvent>,
    receiver: mpsc::Receiver<MetricEvent>,
    sinks: Vec<Box<dyn MetricSink>>,
    enabled: bool,
}

impl EventBus {
    /// Creates a bus with no sinks.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            sinks: Vec::new(),
            enabled: true,
        }
    }

    /// Registers a sink to receive flushed events.
    pub fn add_sink(&mut self, sink: Box<dyn MetricSink>) {
        self.sinks.push(sink);
    }

    /// Disabled buses drop events silently.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Emit an event onto the queue.
    pub fn emit(&self, event: MetricEvent) {
        if !self.enabled {
            return;
        }
        let _ = self.sender.send(event);
    }

    /// Deliver all queued events to every sink, in emission order.
    pub fn flush(&mut self) {
        while let Ok(event) = self.receiver.try_recv() {
            for sink in &mut self.sinks {
                sink.handle(&event);
            }
        }
    }

    /// Flush and finalize all sinks. Call at simulation stop.
    pub fn finalize(&mut self) {
        self.flush();
        for sink in &mut self.sinks {
            sink.finalize();
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
