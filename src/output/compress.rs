//! Bounded pool of external compression processes
//!
//! Rotated files are handed to an external program (`xz` by default). At most
//! `max_in_flight` processes run at once; submitting while the pool is full
//! waits for a slot, so rotation cannot outrun compression.

use crate::config::CompressionConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome counters of a compressor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {
    /// Files handed to the pool
    pub submitted: usize,
    /// Processes that exited successfully
    pub succeeded: usize,
    /// Processes that failed to start or exited with an error
    pub failed: usize,
}

/// Runs compression jobs in the background with a cap on concurrency
#[derive(Debug)]
pub struct Compressor {
    program: String,
    args: Vec<String>,
    max_in_flight: usize,
    slots: Arc<Semaphore>,
    jobs: JoinSet<Result<PathBuf>>,
    stats: CompressionStats,
}

impl Compressor {
    /// Create a compressor from its config
    pub fn new(config: &CompressionConfig) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            max_in_flight,
            slots: Arc::new(Semaphore::new(max_in_flight)),
            jobs: JoinSet::new(),
            stats: CompressionStats::default(),
        }
    }

    /// Processes currently running
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.slots.available_permits()
    }

    /// Counters so far
    pub fn stats(&self) -> CompressionStats {
        self.stats
    }

    /// Start compressing `path`, waiting for a free slot first
    pub async fn submit(&mut self, path: PathBuf) -> Result<()> {
        while let Some(joined) = self.jobs.try_join_next() {
            self.record(joined);
        }

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| Error::compression(&path, e.to_string()))?;

        let program = self.program.clone();
        let args = self.args.clone();
        debug!(path = %path.display(), program = %program, "Submitting compression job");

        self.stats.submitted += 1;
        self.jobs.spawn(async move {
            let status = Command::new(&program)
                .args(&args)
                .arg(&path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .status()
                .await;
            drop(permit);

            match status {
                Ok(status) if status.success() => Ok(path),
                Ok(status) => Err(Error::compression(
                    path,
                    format!("{program} exited with {status}"),
                )),
                Err(e) => Err(Error::compression(
                    path,
                    format!("failed to run {program}: {e}"),
                )),
            }
        });

        Ok(())
    }

    /// Wait for every submitted job and return the final counters
    pub async fn finish(mut self) -> CompressionStats {
        while let Some(joined) = self.jobs.join_next().await {
            self.record(joined);
        }
        self.stats
    }

    fn record(&mut self, joined: std::result::Result<Result<PathBuf>, tokio::task::JoinError>) {
        match joined {
            Ok(Ok(path)) => {
                debug!(path = %path.display(), "Compression finished");
                self.stats.succeeded += 1;
            }
            Ok(Err(e)) => {
                warn!("{e}");
                self.stats.failed += 1;
            }
            Err(e) => {
                warn!("Compression task failed: {e}");
                self.stats.failed += 1;
            }
        }
    }
}
