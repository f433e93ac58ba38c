//! CLI module
//!
//! Command-line interface for exports and field discovery.
//!
//! # Commands
//!
//! - `export` - Export an index to rotating JSON lines files
//! - `fields` - List every field path that occurs in an index
//!
//! Progress markers and field names go to stdout, logs to stderr.

mod commands;
mod runner;

pub use commands::{Cli, Commands, ExportArgs, FieldsArgs};
pub use runner::Runner;
