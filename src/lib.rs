// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # esdump
//!
//! Resumable export of a live Elasticsearch index to local JSON lines files.
//!
//! The index is walked once, in ascending sort order, through a point-in-time
//! snapshot and `search_after` paging. Every hit is written as one line; files
//! are named after the sort key of their first record, so the output directory
//! doubles as the checkpoint a killed run resumes from.
//!
//! ## Features
//!
//! - **Stable scan**: point-in-time sessions, one request in flight at a time
//! - **Shard failure policy**: strict (retry with cooldown, bounded) or ignore
//! - **Rotating output**: periodic flush, rotation, bounded background compression
//! - **Resume**: from an explicit sort key or from the output directory
//! - **Field discovery**: every field path in an index, mapped or not
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use esdump::backend::EsBackend;
//! use esdump::config::ExportConfig;
//! use esdump::engine::ExportEngine;
//!
//! #[tokio::main]
//! async fn main() -> esdump::Result<()> {
//!     let config = ExportConfig::builder("logs-*")
//!         .output_dir("dump")
//!         .build()?;
//!
//!     let backend = EsBackend::from_config(&config.backend)?;
//!     let outcome = ExportEngine::new(backend, config)?.run().await?;
//!     println!("{} records", outcome.stats.records_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ExportEngine                          │
//! │   open session → fetch → evaluate → emit / backoff → ...     │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//! ┌────────┴───────┐  ┌─────────┴────────┐  ┌─────────┴─────────┐
//! │ SearchBackend  │  │   PageRequest    │  │    JsonlSink      │
//! ├────────────────┤  ├──────────────────┤  ├───────────────────┤
//! │ EsBackend      │  │ size, pit, sort  │  │ flush, rotate     │
//! │ HttpClient     │  │ query, extra     │  │ Compressor pool   │
//! │ Authenticator  │  │ search_after     │  │                   │
//! └────────────────┘  └──────────────────┘  └───────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication
pub mod auth;

/// HTTP client
pub mod http;

/// Search backend seam and the Elasticsearch implementation
pub mod backend;

/// Search request construction
pub mod query;

/// Export engine
pub mod engine;

/// Rotating JSON lines output and compression
pub mod output;

/// Progress markers
pub mod progress;

/// Resume seed from an output directory
pub mod resume;

/// Field discovery
pub mod discovery;

/// Configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::ExportConfig;
pub use engine::{ExportEngine, ExportOutcome, Termination};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
