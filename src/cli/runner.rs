//! CLI runner - executes commands

use crate::backend::EsBackend;
use crate::cli::commands::{Cli, Commands, ExportArgs, FieldsArgs};
use crate::config::{BackendConfig, DiscoveryConfig, ExportConfig};
use crate::discovery::FieldDiscovery;
use crate::engine::{ExportEngine, Termination};
use crate::error::{Error, Result};
use crate::progress::ConsoleProgress;
use crate::resume::seed_from_output_dir;
use crate::types::{FailureMode, JsonObject, KeepAlive, OptionStringExt, ResumeCursor};
use serde_json::Value;
use std::io::Write;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Export(args) => self.export(args).await,
            Commands::Fields(args) => self.fields(args).await,
        }
    }

    /// Layer the global connection flags over a base config
    fn backend_config(&self, mut backend: BackendConfig) -> BackendConfig {
        if let Some(source) = self.cli.source.clone().none_if_empty() {
            backend.address = source;
        }
        if self.cli.tls {
            backend.tls = true;
        }
        if let Some(creds) = self.cli.creds.clone().none_if_empty() {
            backend.credentials = Some(creds);
        }
        if let Some(key) = self.cli.api_key.clone().none_if_empty() {
            backend.api_key = Some(key);
        }
        if let Some(timeout) = self.cli.timeout {
            backend.timeout_secs = timeout;
        }
        backend
    }

    /// Build the export config: file (if any), then flags, then resume seed
    pub fn export_config(&self, args: &ExportArgs) -> Result<ExportConfig> {
        let mut config = match &args.config {
            Some(path) => ExportConfig::from_file(path)?,
            None => ExportConfig::default(),
        };

        config.backend = self.backend_config(config.backend);
        config.index = args.index.clone();

        if let Some(query) = &args.query {
            config.query = Some(parse_json("query", query)?);
        }
        if let Some(extra) = &args.extra {
            config.extra = Some(parse_object("extra", extra)?);
        }
        if args.ignore_failures {
            config.failure_mode = FailureMode::Ignore;
        }
        if args.compress {
            config.compression.enabled = true;
        }
        if let Some(dir) = &args.output_dir {
            config.sink.output_dir = dir.clone();
        }
        if let Some(size) = args.page_size {
            config.page_size = size;
        }
        if let Some(max) = args.max_records {
            config.max_records = (max > 0).then_some(max);
        }
        if let Some(field) = args.sort_field.clone().none_if_empty() {
            config.sort_field = field;
        }
        if let Some(keep_alive) = &args.keep_alive {
            config.keep_alive = keep_alive.parse::<KeepAlive>()?;
        }

        if let Some(after) = &args.after {
            config.resume = Some(after.parse::<ResumeCursor>()?);
        } else if args.resume {
            match seed_from_output_dir(&config.sink.output_dir, &config.sink.extension)? {
                Some(cursor) => config.resume = Some(cursor),
                None => info!("No previous output found, starting from the beginning"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Build the discovery config from flags
    pub fn discovery_config(&self, args: &FieldsArgs) -> Result<DiscoveryConfig> {
        if !(args.interval.is_finite() && args.interval > 0.0) {
            return Err(Error::invalid_value("interval", "must be a positive number of seconds"));
        }

        let mut config = DiscoveryConfig::new(args.index.clone());
        config.backend = self.backend_config(config.backend);
        config.interval_ms = ((args.interval * 1000.0).round() as u64).max(1);
        if let Some(query) = &args.query {
            config.query = Some(parse_json("query", query)?);
        }
        if let Some(field) = args.timestamp_field.clone().none_if_empty() {
            config.timestamp_field = field;
        }

        config.validate()?;
        Ok(config)
    }

    async fn export(&self, args: &ExportArgs) -> Result<()> {
        let config = self.export_config(args)?;
        if let Some(cursor) = &config.resume {
            info!(index = %config.index, after = %cursor, "Starting export");
        } else {
            info!(index = %config.index, "Starting export");
        }

        let backend = EsBackend::from_config(&config.backend)?;
        let mut engine =
            ExportEngine::new(backend, config)?.with_progress(Box::new(ConsoleProgress::stdout()));
        let outcome = engine.run().await?;

        match outcome.termination {
            Termination::EndOfData => {}
            Termination::Ambiguous => warn!(
                "Export stopped on an empty page with shard failures; the output may be incomplete"
            ),
            Termination::RecordLimit => {
                if let Some(cursor) = outcome.last_key.as_ref().and_then(ResumeCursor::before) {
                    info!(resume_after = %cursor, "Stopped at the record limit");
                }
            }
        }
        Ok(())
    }

    async fn fields(&self, args: &FieldsArgs) -> Result<()> {
        let config = self.discovery_config(args)?;
        let backend = EsBackend::from_config(&config.backend)?;
        let mut discovery =
            FieldDiscovery::new(backend, config)?.with_progress(Box::new(ConsoleProgress::stdout()));
        let fields = discovery.run().await?;

        let mut out = std::io::stdout().lock();
        for field in &fields {
            writeln!(out, "{}", serde_json::to_string(field)?)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Parse a JSON flag value
fn parse_json(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| Error::invalid_value(flag, format!("not valid JSON: {e}")))
}

/// Parse a JSON flag value that must be an object
fn parse_object(flag: &str, raw: &str) -> Result<JsonObject> {
    match parse_json(flag, raw)? {
        Value::Object(object) => Ok(object),
        _ => Err(Error::invalid_value(flag, "must be a JSON object")),
    }
}
