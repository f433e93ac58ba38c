//! Export engine
//!
//! Drives one export run as a small state machine:
//!
//! ```text
//! OPEN_SESSION -> FETCHING -> EVALUATING -> EMITTING -> FETCHING ...
//!                     ^            |
//!                     +-- BACKOFF -+        (strict mode, shard failures)
//! ```
//!
//! The run ends on a short page, on an ambiguous empty page in ignore mode,
//! when the record limit is reached, or with an error. Every page is written
//! before the cursor moves past it, so a failed run can be resumed from the
//! last record on disk.
//!
//! # Overview
//!
//! - [`ExportEngine`] owns the backend and the progress channel
//! - [`EngineState`] holds everything that changes during a run
//! - [`evaluate`] classifies each fetched page into a [`Verdict`]

mod types;

pub use types::{
    evaluate, EngineState, ExportOutcome, ExportStats, FailureTracker, Termination, Verdict,
};

use crate::backend::{PageResult, SearchBackend};
use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::output::{Compressor, JsonlSink};
use crate::progress::{Marker, NoProgress, ProgressReporter};
use crate::query::PageRequest;
use crate::types::FailureMode;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs exports against a [`SearchBackend`]
pub struct ExportEngine<B: SearchBackend> {
    /// Backend serving the scan
    backend: B,
    /// Run configuration
    config: ExportConfig,
    /// Liveness markers
    progress: Box<dyn ProgressReporter>,
}

impl<B: SearchBackend> ExportEngine<B> {
    /// Create an engine, validating the config
    pub fn new(backend: B, config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            progress: Box::new(NoProgress),
        })
    }

    /// Set the progress channel
    #[must_use]
    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Get the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the run configuration
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Run the export to completion.
    ///
    /// On error the open output file is still flushed and closed, and
    /// compression jobs already started are waited for.
    pub async fn run(&mut self) -> Result<ExportOutcome> {
        let start = Instant::now();
        let sink = JsonlSink::new(self.config.sink.clone())?;
        let compressor = self
            .config
            .compression
            .enabled
            .then(|| Compressor::new(&self.config.compression));

        let session = self
            .backend
            .open_session(&self.config.index, &self.config.keep_alive)
            .await?;
        debug!(session = %session.id(), "Cursor session opened");

        let mut state = EngineState {
            request: PageRequest::new(&self.config, session),
            failures: FailureTracker::new(self.config.retry.max_consecutive_failures),
            last_key: None,
            sink,
            compressor,
            stats: ExportStats::new(),
        };

        let result = self.drive(&mut state).await;
        self.progress.end_line();

        let EngineState {
            sink,
            compressor,
            mut stats,
            last_key,
            ..
        } = state;
        let closed = sink.finish();
        if let Some(compressor) = compressor {
            stats.compression = compressor.finish().await;
        }
        stats.duration_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            if let Some(key) = &last_key {
                error!(last_key = %key, records = stats.records_written, "Export failed: {e}");
            } else {
                error!(records = stats.records_written, "Export failed: {e}");
            }
        }
        let termination = result?;
        let last_file = closed?;

        info!(
            records = stats.records_written,
            pages = stats.pages_fetched,
            files_rotated = stats.files_rotated,
            retries = stats.retries,
            slow_pages = stats.slow_pages,
            duration_ms = stats.duration_ms,
            ?termination,
            "Export finished"
        );
        if stats.compression.failed > 0 {
            warn!(
                failed = stats.compression.failed,
                "Some rotated files were left uncompressed"
            );
        }

        Ok(ExportOutcome {
            termination,
            stats,
            last_file,
            last_key,
        })
    }

    /// The fetch / evaluate / emit loop
    async fn drive(&mut self, state: &mut EngineState) -> Result<Termination> {
        let mode = self.config.failure_mode;
        let keep_alive = self.config.keep_alive.duration();

        loop {
            let started = Instant::now();
            let page = self.backend.fetch_page(&state.request).await?;
            let elapsed = started.elapsed();
            state.stats.pages_fetched += 1;

            if !keep_alive.is_zero() && elapsed > keep_alive {
                state.stats.slow_pages += 1;
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    keep_alive = %self.config.keep_alive,
                    "Page took longer than the keep-alive, the cursor session may expire"
                );
            }

            let failed = page.shard_failures() > 0;
            if failed {
                state.stats.shard_failure_pages += 1;
            }

            let verdict = evaluate(
                mode,
                self.config.page_size,
                page.len(),
                page.shard_failures(),
                &mut state.failures,
            );
            self.progress.mark(match (mode, failed) {
                (_, false) => Marker::Ok,
                (FailureMode::Strict, true) => Marker::ShardFailure,
                (FailureMode::Ignore, true) => Marker::PartialResults,
            });

            match verdict {
                Verdict::Fatal => {
                    return Err(Error::ShardFailures {
                        consecutive: state.failures.consecutive(),
                    });
                }
                Verdict::Backoff => {
                    state.stats.retries += 1;
                    let cooldown = self.config.retry.cooldown();
                    warn!(
                        failed_shards = page.shard_failures(),
                        consecutive = state.failures.consecutive(),
                        cooldown_ms = cooldown.as_millis() as u64,
                        "Shard failures, retrying the same page"
                    );
                    tokio::time::sleep(cooldown).await;
                }
                Verdict::StopAmbiguous => {
                    self.progress.mark(Marker::AmbiguousEnd);
                    warn!(
                        failed_shards = page.shard_failures(),
                        "Empty page with shard failures, the export may be incomplete"
                    );
                    return Ok(Termination::Ambiguous);
                }
                Verdict::EmitAndContinue | Verdict::EmitAndStop => {
                    if failed {
                        warn!(
                            failed_shards = page.shard_failures(),
                            hits = page.len(),
                            "Accepting partial page"
                        );
                    }
                    if self.emit(state, &page).await? {
                        return Ok(Termination::RecordLimit);
                    }
                    state
                        .request
                        .advance(page.last_key(), page.next_session().clone());
                    if verdict == Verdict::EmitAndStop {
                        return Ok(Termination::EndOfData);
                    }
                }
            }
        }
    }

    /// Write a page's hits in order; true when the record limit was hit
    async fn emit(&mut self, state: &mut EngineState, page: &PageResult) -> Result<bool> {
        if let (Some(previous), Some(first)) = (&state.last_key, page.first_key()) {
            if first.compare(previous) == Some(Ordering::Less) {
                warn!(
                    previous = %previous,
                    next = %first,
                    "Sort keys went backwards between pages"
                );
            }
        }

        for hit in page.hits() {
            let outcome = state.sink.write(hit)?;
            state.stats.records_written += 1;
            state.last_key = Some(hit.sort_key().clone());

            if outcome.flushed {
                self.progress.mark(Marker::Flush);
            }
            if let Some(path) = outcome.rotated {
                self.progress.mark(Marker::Rotate);
                state.stats.files_rotated += 1;
                if let Some(compressor) = state.compressor.as_mut() {
                    compressor.submit(path).await?;
                }
            }

            if self
                .config
                .max_records
                .is_some_and(|max| state.stats.records_written >= max)
            {
                info!(
                    records = state.stats.records_written,
                    "Record limit reached"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
