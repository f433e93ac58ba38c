//! Progress markers
//!
//! A minimal liveness channel for operators: one character per event, flushed
//! immediately. This is not logging; structured diagnostics go through
//! `tracing`.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// One progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// A page (or discovery window) completed cleanly
    Ok,
    /// Strict mode: a page reported shard failures and will be retried
    ShardFailure,
    /// Ignore mode: a page reported shard failures and was accepted anyway
    PartialResults,
    /// Ignore mode: empty page with shard failures, completeness unknown
    AmbiguousEnd,
    /// The open output file was flushed
    Flush,
    /// The open output file was closed and rotated
    Rotate,
    /// Discovery: the aggregation was saturated and is retried larger
    Grow,
}

impl Marker {
    /// Character written for this marker
    pub fn as_char(self) -> char {
        match self {
            Self::Ok => '.',
            Self::ShardFailure => 'f',
            Self::PartialResults => 'p',
            Self::AmbiguousEnd => '0',
            Self::Flush => 'o',
            Self::Rotate | Self::Grow => 'x',
        }
    }
}

/// Destination of progress markers
pub trait ProgressReporter: Send {
    /// Emit one marker
    fn mark(&mut self, marker: Marker);

    /// Terminate the marker line
    fn end_line(&mut self);
}

/// Writes markers to a terminal-like stream, flushing after each one
#[derive(Debug)]
pub struct ConsoleProgress<W: Write + Send> {
    out: W,
}

impl ConsoleProgress<io::Stdout> {
    /// Markers on standard output
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    /// Markers on any writer
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ProgressReporter for ConsoleProgress<W> {
    fn mark(&mut self, marker: Marker) {
        // A broken progress stream must not stop the export.
        let _ = write!(self.out, "{}", marker.as_char());
        let _ = self.out.flush();
    }

    fn end_line(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}

/// Discards all markers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn mark(&mut self, _marker: Marker) {}

    fn end_line(&mut self) {}
}

/// Keeps markers in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    buf: Arc<Mutex<String>>,
}

impl RecordingProgress {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn contents(&self) -> String {
        self.buf.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn mark(&mut self, marker: Marker) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.push(marker.as_char());
        }
    }

    fn end_line(&mut self) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.push('\n');
        }
    }
}
