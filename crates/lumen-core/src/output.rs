//! Per-run output capture.
//!
//! While an [`OutputAttachment`] is alive, everything the running unit prints
//! on this thread goes to the attached [`OutputSink`] instead of the process
//! streams. Writes are forwarded as they happen so a session can watch a unit
//! that never finishes.

use std::cell::RefCell;
use std::io::Write;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

/// Which stream a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Destination for the output of one execution.
pub trait OutputSink: Send + Sync {
    /// Receive a chunk of output. Called from the worker thread.
    fn write(&self, stream: Stream, text: &str);

    /// The sink became the active destination for a run.
    fn mark_open(&self) {}

    /// The run finished; no further writes will arrive for it.
    fn mark_closed(&self) {}
}

thread_local! {
    /// Sink attached for the run executing on this thread.
    static ACTIVE_SINK: RefCell<Option<Arc<dyn OutputSink>>> = const { RefCell::new(None) };
}

/// Attach/detach entry point for the thread's output sink.
pub struct OutputChannel;

impl OutputChannel {
    /// Route this thread's output to `sink` until the attachment is detached.
    pub fn attach(sink: Arc<dyn OutputSink>) -> OutputAttachment {
        sink.mark_open();
        let previous = ACTIVE_SINK.with(|slot| slot.borrow_mut().replace(sink.clone()));
        OutputAttachment {
            sink,
            previous,
            detached: false,
            _thread_bound: PhantomData,
        }
    }

    /// Whether a sink is attached on this thread.
    pub fn is_attached() -> bool {
        ACTIVE_SINK.with(|slot| slot.borrow().is_some())
    }
}

/// Live attachment of a sink to the current thread.
///
/// Detaching restores whatever was attached before, exactly once; dropping
/// the attachment detaches it.
pub struct OutputAttachment {
    sink: Arc<dyn OutputSink>,
    previous: Option<Arc<dyn OutputSink>>,
    detached: bool,
    // Restores a thread-local slot, so it must be dropped on the thread that created it.
    _thread_bound: PhantomData<*const ()>,
}

impl OutputAttachment {
    /// Stop routing output to the sink. Redundant calls are no-ops.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        let previous = self.previous.take();
        ACTIVE_SINK.with(|slot| *slot.borrow_mut() = previous);
        self.sink.mark_closed();
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

impl Drop for OutputAttachment {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Write to the attached sink, or to the process stream when none is attached.
pub fn emit(stream: Stream, text: &str) {
    let sink = ACTIVE_SINK.with(|slot| slot.borrow().clone());
    match sink {
        Some(sink) => sink.write(stream, text),
        None => match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Stream::Stderr => {
                let _ = std::io::stderr().lock().write_all(text.as_bytes());
            }
        },
    }
}

/// One event observed by a [`BufferedSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Opened,
    Write(Stream, String),
    Closed,
}

/// Sink that records every event, in order.
#[derive(Debug, Default)]
pub struct BufferedSink {
    events: Mutex<Vec<OutputEvent>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Concatenated text written to one stream.
    pub fn text(&self, stream: Stream) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutputEvent::Write(s, text) if s == stream => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn stdout(&self) -> String {
        self.text(Stream::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.text(Stream::Stderr)
    }

    pub fn write_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, OutputEvent::Write(..)))
            .count()
    }

    pub fn open_count(&self) -> usize {
        self.events().iter().filter(|e| **e == OutputEvent::Opened).count()
    }

    pub fn close_count(&self) -> usize {
        self.events().iter().filter(|e| **e == OutputEvent::Closed).count()
    }

    fn record(&self, event: OutputEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl OutputSink for BufferedSink {
    fn write(&self, stream: Stream, text: &str) {
        self.record(OutputEvent::Write(stream, text.to_string()));
    }

    fn mark_open(&self) {
        self.record(OutputEvent::Opened);
    }

    fn mark_closed(&self) {
        self.record(OutputEvent::Closed);
    }
}

/// Sink that writes straight through to the process streams, flushing each chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write(&self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Stream::Stderr => {
                let mut err = std::io::stderr().lock();
                let _ = err.write_all(text.as_bytes());
                let _ = err.flush();
            }
        }
    }
}
