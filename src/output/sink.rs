//! Rotating JSON lines sink

use crate::config::SinkConfig;
use crate::error::{Error, Result, ResultExt};
use crate::types::{Hit, SortKey};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An open output file. Never reopened once closed.
#[derive(Debug)]
pub struct OutputFile {
    name: String,
    path: PathBuf,
    record_count: u64,
    writer: BufWriter<File>,
}

impl OutputFile {
    fn create(dir: &Path, name: String) -> Result<Self> {
        let path = dir.join(&name);
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;

        debug!(path = %path.display(), "Opened output file");
        Ok(Self {
            name,
            path,
            record_count: 0,
            writer: BufWriter::new(file),
        })
    }

    /// File name, derived from the first record's sort key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written to this file
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    fn append(&mut self, hit: &Hit) -> Result<()> {
        serde_json::to_writer(&mut self.writer, hit.envelope())?;
        self.writer.write_all(b"\n")?;
        self.record_count += 1;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn close(mut self) -> Result<PathBuf> {
        self.sync()?;
        Ok(self.path)
    }
}

/// What a single write did besides appending the record
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The file was flushed to disk after this record
    pub flushed: bool,
    /// The file reached the rotation threshold and was closed
    pub rotated: Option<PathBuf>,
}

/// Writes hits as JSON lines into rotating files.
///
/// A file is opened lazily on the first write after construction or rotation
/// and named `<sort key>.<extension>` after that write's hit.
#[derive(Debug)]
pub struct JsonlSink {
    config: SinkConfig,
    current: Option<OutputFile>,
    completed: Vec<PathBuf>,
    records_written: u64,
}

impl JsonlSink {
    /// Create a sink, creating the output directory if needed
    pub fn new(config: SinkConfig) -> Result<Self> {
        if config.flush_every == 0 || config.rotate_every == 0 {
            return Err(Error::config("flush and rotation thresholds must be positive"));
        }
        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

        Ok(Self {
            config,
            current: None,
            completed: Vec::new(),
            records_written: 0,
        })
    }

    /// File name for a file whose first record has this key
    pub fn file_name(&self, key: &SortKey) -> Result<String> {
        let stem = key
            .file_stem()
            .ok_or_else(|| Error::output(format!("sort key {key} cannot name a file")))?;
        if stem.contains(['/', '\\']) || stem == "." || stem == ".." {
            return Err(Error::output(format!(
                "sort key {key} is not a valid file name"
            )));
        }
        Ok(format!("{stem}.{}", self.config.extension))
    }

    /// Append one hit
    pub fn write(&mut self, hit: &Hit) -> Result<WriteOutcome> {
        if self.current.is_none() {
            let name = self.file_name(hit.sort_key())?;
            self.current = Some(OutputFile::create(&self.config.output_dir, name)?);
        }
        let file = self
            .current
            .as_mut()
            .ok_or_else(|| Error::output("no open output file"))?;

        file.append(hit)?;
        self.records_written += 1;

        let mut outcome = WriteOutcome::default();
        let count = file.record_count();

        if count % self.config.flush_every == 0 {
            file.sync()?;
            outcome.flushed = true;
        }

        if count >= self.config.rotate_every {
            if let Some(file) = self.current.take() {
                let path = file.close()?;
                info!(path = %path.display(), records = count, "Rotated output file");
                self.completed.push(path.clone());
                outcome.rotated = Some(path);
            }
        }

        Ok(outcome)
    }

    /// The file currently open, if any
    pub fn current(&self) -> Option<&OutputFile> {
        self.current.as_ref()
    }

    /// Total records written by this sink
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Files closed by rotation, in order
    pub fn completed_files(&self) -> &[PathBuf] {
        &self.completed
    }

    /// Flush and close the open file, returning its path
    pub fn finish(mut self) -> Result<Option<PathBuf>> {
        match self.current.take() {
            Some(file) => {
                let records = file.record_count();
                let path = file.close()?;
                info!(path = %path.display(), records, "Closed final output file");
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}
