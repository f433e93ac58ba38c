//! Output module
//!
//! Writes exported hits to rotating JSON lines files.
//!
//! # Overview
//!
//! This module provides:
//! - `JsonlSink` - one hit per line, files named after their first record's
//!   sort key, periodic flushes and rotation after a record count
//! - `Compressor` - bounded pool of external compression processes for
//!   rotated files

mod compress;
mod sink;

pub use compress::{CompressionStats, Compressor};
pub use sink::{JsonlSink, OutputFile, WriteOutcome};

#[cfg(test)]
mod tests;
