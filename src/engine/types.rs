//! Engine types
//!
//! Verdicts of the page evaluation step, the explicit per-run state, and the
//! statistics and outcome of an export.

use crate::output::{CompressionStats, Compressor, JsonlSink};
use crate::query::PageRequest;
use crate::types::{FailureMode, SortKey};
use std::path::PathBuf;

/// Decision taken after a page has been fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Write the page, then fetch the next one
    EmitAndContinue,
    /// Write the page, then stop: end of data
    EmitAndStop,
    /// Stop without writing: empty page while shards are failing
    StopAmbiguous,
    /// Sleep, then re-issue the same request
    Backoff,
    /// Too many consecutive pages with shard failures
    Fatal,
}

/// Consecutive shard-failure counter with its cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTracker {
    consecutive: u32,
    cap: u32,
}

impl FailureTracker {
    /// Create a tracker that trips after `cap` consecutive failures
    pub fn new(cap: u32) -> Self {
        Self {
            consecutive: 0,
            cap: cap.max(1),
        }
    }

    /// Count one more failed page; true once the cap is reached
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.cap
    }

    /// A clean page resets the count
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Failed pages in a row so far
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Classify a fetched page.
///
/// Strict mode retries any page with shard failures and ends on the first
/// short page. Ignore mode accepts partial pages; it ends on a short page
/// without failures, or on an empty page with failures, which cannot be told
/// apart from data hidden behind a failing shard.
pub fn evaluate(
    mode: FailureMode,
    page_size: u32,
    hits: usize,
    shard_failures: u64,
    failures: &mut FailureTracker,
) -> Verdict {
    let short = hits < page_size as usize;

    match mode {
        FailureMode::Strict => {
            if shard_failures > 0 {
                return if failures.record_failure() {
                    Verdict::Fatal
                } else {
                    Verdict::Backoff
                };
            }
            failures.reset();
            if short {
                Verdict::EmitAndStop
            } else {
                Verdict::EmitAndContinue
            }
        }
        FailureMode::Ignore => {
            if shard_failures > 0 {
                if hits == 0 {
                    Verdict::StopAmbiguous
                } else {
                    Verdict::EmitAndContinue
                }
            } else if short {
                Verdict::EmitAndStop
            } else {
                Verdict::EmitAndContinue
            }
        }
    }
}

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A page came back short of a full page
    EndOfData,
    /// Ignore mode: an empty page with shard failures; completeness unknown
    Ambiguous,
    /// The configured record limit was reached
    RecordLimit,
}

impl Termination {
    /// Whether the run is known to have exported everything it was asked for
    pub fn is_complete(self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

/// Statistics from an export run
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    /// Pages fetched, retries included
    pub pages_fetched: usize,
    /// Records written
    pub records_written: u64,
    /// Files closed by rotation
    pub files_rotated: usize,
    /// Pages that reported shard failures
    pub shard_failure_pages: usize,
    /// Strict-mode retries
    pub retries: usize,
    /// Fetches that took longer than the keep-alive window
    pub slow_pages: usize,
    /// Compression outcomes
    pub compression: CompressionStats,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExportStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a completed (non-failed) export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Why the run stopped
    pub termination: Termination,
    /// Run statistics
    pub stats: ExportStats,
    /// The file left open at the end, closed but not compressed
    pub last_file: Option<PathBuf>,
    /// Sort key of the last record written
    pub last_key: Option<SortKey>,
}

/// Everything that changes while a run is in progress.
///
/// Owned by a single run and threaded through every iteration; nothing here
/// outlives it.
#[derive(Debug)]
pub struct EngineState {
    /// Request for the next fetch (session and cursor included)
    pub request: PageRequest,
    /// Strict-mode consecutive failure counter
    pub failures: FailureTracker,
    /// Sort key of the last record written
    pub last_key: Option<SortKey>,
    /// Output sink
    pub sink: JsonlSink,
    /// Compression pool, when enabled
    pub compressor: Option<Compressor>,
    /// Running statistics
    pub stats: ExportStats,
}
