//! Configuration types for exports and field discovery
//!
//! An `ExportConfig` is assembled once, from a YAML/JSON file, the builder, or
//! CLI flags layered on top of either, and validated before a run starts.
//! The engine only ever holds a shared reference to it.

use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::types::{FailureMode, JsonObject, KeepAlive, ResumeCursor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Body keys the engine owns; an extra fragment cannot override them
pub const RESERVED_BODY_KEYS: [&str; 3] = ["size", "pit", "search_after"];

// ============================================================================
// Backend
// ============================================================================

/// Where and how to reach the search backend
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `host:port` of the backend
    #[serde(default = "default_address")]
    pub address: String,

    /// Use https instead of http
    #[serde(default)]
    pub tls: bool,

    /// `user:password` for HTTP Basic authentication
    #[serde(default)]
    pub credentials: Option<String>,

    /// Encoded API key, used when no credentials are given
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            tls: false,
            credentials: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    100
}

impl BackendConfig {
    /// Base URL of the backend, e.g. `https://es:9200`
    pub fn base_url(&self) -> Result<String> {
        let scheme = if self.tls { "https" } else { "http" };
        let base = format!("{scheme}://{}", self.address.trim_end_matches('/'));
        let parsed = url::Url::parse(&base)?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(Error::invalid_value("address", "missing host"));
        }
        Ok(base)
    }

    /// Authentication derived from credentials or API key
    pub fn auth(&self) -> Result<AuthConfig> {
        if let Some(credentials) = &self.credentials {
            return AuthConfig::from_credentials(credentials);
        }
        if let Some(key) = &self.api_key {
            return Ok(AuthConfig::ApiKey { value: key.clone() });
        }
        Ok(AuthConfig::None)
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("address", &self.address)
            .field("tls", &self.tls)
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Strict-mode handling of pages that report shard failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause before re-issuing a page that reported shard failures, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Consecutive failed pages that abort the run
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(cooldown: Duration, max_consecutive_failures: u32) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis() as u64,
            max_consecutive_failures,
        }
    }

    /// Cooldown between retries
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

// ============================================================================
// Output Sink
// ============================================================================

/// Output file layout and cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Directory the files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Flush the open file every this many records
    #[serde(default = "default_flush_every")]
    pub flush_every: u64,

    /// Close the open file after this many records
    #[serde(default = "default_rotate_every")]
    pub rotate_every: u64,

    /// File extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            flush_every: default_flush_every(),
            rotate_every: default_rotate_every(),
            extension: default_extension(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_flush_every() -> u64 {
    100_000
}

fn default_rotate_every() -> u64 {
    1_000_000
}

fn default_extension() -> String {
    "json".to_string()
}

// ============================================================================
// Compression
// ============================================================================

/// Compression of rotated files by an external program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compress files as they are rotated
    #[serde(default)]
    pub enabled: bool,

    /// Program invoked with the file path as its last argument
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the file path
    #[serde(default)]
    pub args: Vec<String>,

    /// Most compression processes running at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_program(),
            args: Vec::new(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_program() -> String {
    "xz".to_string()
}

fn default_max_in_flight() -> usize {
    2
}

// ============================================================================
// Export
// ============================================================================

/// Complete description of one export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Index (or alias / pattern) to export
    #[serde(default)]
    pub index: String,

    /// Optional filter query, placed under `query`
    #[serde(default)]
    pub query: Option<Value>,

    /// Optional fragment merged into every search body
    #[serde(default)]
    pub extra: Option<JsonObject>,

    /// Treatment of partial shard failures
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Key to resume after
    #[serde(default)]
    pub resume: Option<ResumeCursor>,

    /// Hits per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Field the scan is ordered on
    #[serde(default = "default_sort_field")]
    pub sort_field: String,

    /// How long the backend keeps the cursor session between pages
    #[serde(default)]
    pub keep_alive: KeepAlive,

    /// Strict-mode retry policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Output files
    #[serde(default)]
    pub sink: SinkConfig,

    /// Compression of rotated files
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Stop after this many records
    #[serde(default)]
    pub max_records: Option<u64>,
}

fn default_page_size() -> u32 {
    10_000
}

fn default_sort_field() -> String {
    "@timestamp".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            index: String::new(),
            query: None,
            extra: None,
            failure_mode: FailureMode::default(),
            resume: None,
            page_size: default_page_size(),
            sort_field: default_sort_field(),
            keep_alive: KeepAlive::default(),
            retry: RetryPolicy::default(),
            sink: SinkConfig::default(),
            compression: CompressionConfig::default(),
            max_records: None,
        }
    }
}

impl ExportConfig {
    /// Start building a config for the given index
    pub fn builder(index: impl Into<String>) -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: ExportConfig {
                index: index.into(),
                ..Self::default()
            },
        }
    }

    /// Parse a config from YAML (or JSON) text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Check the config is usable for a run
    pub fn validate(&self) -> Result<()> {
        if self.index.trim().is_empty() {
            return Err(Error::invalid_value("index", "must not be empty"));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be greater than 0"));
        }
        if self.sort_field.trim().is_empty() {
            return Err(Error::invalid_value("sort_field", "must not be empty"));
        }
        if self.sink.flush_every == 0 {
            return Err(Error::invalid_value("flush_every", "must be greater than 0"));
        }
        if self.sink.rotate_every == 0 {
            return Err(Error::invalid_value("rotate_every", "must be greater than 0"));
        }
        if self.retry.max_consecutive_failures == 0 {
            return Err(Error::invalid_value(
                "max_consecutive_failures",
                "must be greater than 0",
            ));
        }
        if self.compression.enabled && self.compression.max_in_flight == 0 {
            return Err(Error::invalid_value(
                "max_in_flight",
                "must be greater than 0",
            ));
        }
        if self.compression.enabled && self.compression.program.trim().is_empty() {
            return Err(Error::invalid_value("program", "must not be empty"));
        }
        if self.max_records == Some(0) {
            return Err(Error::invalid_value("max_records", "must be greater than 0"));
        }
        if let Some(query) = &self.query {
            if !query.is_object() {
                return Err(Error::invalid_value("query", "must be a JSON object"));
            }
        }
        self.backend.base_url()?;
        self.backend.auth()?;
        Ok(())
    }

    /// Keys of the extra fragment that the engine will not let through
    pub fn reserved_extra_keys(&self) -> Vec<&str> {
        self.extra
            .as_ref()
            .map(|extra| {
                RESERVED_BODY_KEYS
                    .iter()
                    .copied()
                    .filter(|key| extra.contains_key(*key))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builder for [`ExportConfig`]
#[derive(Debug, Clone)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Set the backend connection
    #[must_use]
    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the filter query
    #[must_use]
    pub fn query(mut self, query: Value) -> Self {
        self.config.query = Some(query);
        self
    }

    /// Set the extra body fragment
    #[must_use]
    pub fn extra(mut self, extra: JsonObject) -> Self {
        self.config.extra = Some(extra);
        self
    }

    /// Set the failure mode
    #[must_use]
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    /// Resume after the given key
    #[must_use]
    pub fn resume(mut self, cursor: ResumeCursor) -> Self {
        self.config.resume = Some(cursor);
        self
    }

    /// Set page size
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the sort field
    #[must_use]
    pub fn sort_field(mut self, field: impl Into<String>) -> Self {
        self.config.sort_field = field.into();
        self
    }

    /// Set the cursor keep-alive
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sink.output_dir = dir.into();
        self
    }

    /// Set flush and rotation thresholds
    #[must_use]
    pub fn thresholds(mut self, flush_every: u64, rotate_every: u64) -> Self {
        self.config.sink.flush_every = flush_every;
        self.config.sink.rotate_every = rotate_every;
        self
    }

    /// Set compression
    #[must_use]
    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.config.compression = compression;
        self
    }

    /// Stop after this many records
    #[must_use]
    pub fn max_records(mut self, max: u64) -> Self {
        self.config.max_records = Some(max);
        self
    }

    /// Validate and build the config
    pub fn build(self) -> Result<ExportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Field Discovery
// ============================================================================

/// Settings for the field discovery scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Index to scan
    pub index: String,

    /// Optional filter query
    #[serde(default)]
    pub query: Option<Value>,

    /// Timestamp field the windows are cut on
    #[serde(default = "default_sort_field")]
    pub timestamp_field: String,

    /// Window width in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Aggregation size of the first attempt per window
    #[serde(default = "default_initial_agg_size")]
    pub initial_agg_size: u32,

    /// Attempts per window, doubling the aggregation size each time
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_initial_agg_size() -> u32 {
    1_000
}

fn default_max_attempts() -> u32 {
    3
}

impl DiscoveryConfig {
    /// Create a discovery config with defaults for the given index
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::default(),
            index: index.into(),
            query: None,
            timestamp_field: default_sort_field(),
            interval_ms: default_interval_ms(),
            initial_agg_size: default_initial_agg_size(),
            max_attempts: default_max_attempts(),
        }
    }

    /// Window width
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Check the config is usable for a scan
    pub fn validate(&self) -> Result<()> {
        if self.index.trim().is_empty() {
            return Err(Error::invalid_value("index", "must not be empty"));
        }
        if self.interval_ms == 0 {
            return Err(Error::invalid_value("interval", "must be greater than 0"));
        }
        if self.initial_agg_size == 0 {
            return Err(Error::invalid_value(
                "initial_agg_size",
                "must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be greater than 0"));
        }
        self.backend.base_url()?;
        Ok(())
    }
}
