//! Resume seed from an existing output directory
//!
//! Output files are named after the first key they hold, so the file with the
//! greatest numeric stem is the one a killed run was writing. The cursor is
//! taken from its last complete line, one unit back, so records sharing the
//! last timestamp are fetched again rather than skipped.
//!
//! Rotated files may have been compressed (`<n>.<ext>.xz`). They still count
//! when picking the latest stem; if the latest one is compressed the seed is
//! refused instead of falling back to an older file.

use crate::error::{Error, Result, ResultExt};
use crate::types::{ResumeCursor, SortKey};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One `<n>.<ext>` or `<n>.<ext>.<suffix>` file of an earlier run
#[derive(Debug)]
struct OutputEntry {
    stem: i64,
    path: PathBuf,
    compressed: bool,
}

/// Derive a resume cursor from the files in `dir`.
///
/// Returns `None` when the directory holds no output files, and an error when
/// the newest output file is compressed.
pub fn seed_from_output_dir(dir: &Path, extension: &str) -> Result<Option<ResumeCursor>> {
    let Some(latest) = latest_output_file(dir, extension)? else {
        debug!(dir = %dir.display(), "No output files to resume from");
        return Ok(None);
    };

    if latest.compressed {
        return Err(Error::config(format!(
            "latest output file {} is compressed; pass the resume cursor explicitly as AFTER",
            latest.path.display()
        )));
    }

    let path = latest.path;
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let cursor = match last_complete_key(&contents) {
        Some(key) => ResumeCursor::before(&key),
        None => {
            warn!(path = %path.display(), "No complete record in the latest file, resuming from its name");
            Some(ResumeCursor::new(Value::from(latest.stem - 1)))
        }
    };

    if let Some(cursor) = &cursor {
        info!(path = %path.display(), cursor = %cursor, "Resuming from output directory");
    }
    Ok(cursor)
}

/// The output file with the greatest numeric stem; on a tie the uncompressed one
fn latest_output_file(dir: &Path, extension: &str) -> Result<Option<OutputEntry>> {
    if !dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list output directory {}", dir.display()))?;

    let mut latest: Option<OutputEntry> = None;
    for entry in entries {
        let path = entry?.path();
        let Some(candidate) = parse_output_name(&path, extension) else {
            continue;
        };
        let newer = latest.as_ref().map_or(true, |best| {
            candidate.stem > best.stem
                || (candidate.stem == best.stem && best.compressed && !candidate.compressed)
        });
        if newer {
            latest = Some(candidate);
        }
    }

    Ok(latest)
}

fn parse_output_name(path: &Path, extension: &str) -> Option<OutputEntry> {
    let name = path.file_name()?.to_str()?;
    let (stem, rest) = name.split_once('.')?;
    let stem = stem.parse::<i64>().ok()?;
    let compressed = if rest == extension {
        false
    } else {
        let suffix = rest.strip_prefix(extension)?.strip_prefix('.')?;
        if suffix.is_empty() {
            return None;
        }
        true
    };
    Some(OutputEntry {
        stem,
        path: path.to_path_buf(),
        compressed,
    })
}

/// Sort key of the last line that parses as a full hit
fn last_complete_key(contents: &str) -> Option<SortKey> {
    contents.lines().rev().find_map(|line| {
        let value: Value = serde_json::from_str(line).ok()?;
        let sort = value.get("sort")?.as_array()?;
        if sort.is_empty() {
            return None;
        }
        Some(SortKey::new(sort.clone()))
    })
}
