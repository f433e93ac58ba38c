//! Common types used throughout esdump
//!
//! This module contains the shared domain types: the ordering key carried by
//! every hit, the hit envelope itself, the resume cursor and the keep-alive
//! duration understood by the backend.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Sort Key
// ============================================================================

/// Ordering key of a hit, exactly as the backend returned it in `sort`.
///
/// The key has two derived uses that are kept apart on purpose:
/// - [`SortKey::cursor`] is the `search_after` value for the next page
/// - [`SortKey::file_stem`] is the human-readable name seed of an output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(Vec<Value>);

impl SortKey {
    /// Create a sort key from its components
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Components of the key
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// First component (the timestamp for the default sort)
    pub fn primary(&self) -> Option<&Value> {
        self.0.first()
    }

    /// The key as a `search_after` array
    pub fn cursor(&self) -> Value {
        Value::Array(self.0.clone())
    }

    /// File name seed derived from the primary component
    pub fn file_stem(&self) -> Option<String> {
        match self.primary()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Compare two keys component by component.
    ///
    /// Returns `None` when components have incomparable types.
    pub fn compare(&self, other: &SortKey) -> Option<Ordering> {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ord = compare_values(a, b)?;
            if ord != Ordering::Equal {
                return Some(ord);
            }
        }
        Some(self.0.len().cmp(&other.0.len()))
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cursor())
    }
}

// ============================================================================
// Hit
// ============================================================================

/// One search hit: the full envelope plus its decoded sort key.
///
/// The envelope is written out verbatim, `sort` included, so any output line
/// can seed a resume.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    sort_key: SortKey,
    envelope: Value,
}

impl Hit {
    /// Build a hit from the envelope returned by the backend
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        let sort = envelope
            .get("sort")
            .and_then(Value::as_array)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| Error::malformed("hit without a sort key"))?;

        Ok(Self {
            sort_key: SortKey::new(sort.clone()),
            envelope,
        })
    }

    /// Sort key of the hit
    pub fn sort_key(&self) -> &SortKey {
        &self.sort_key
    }

    /// Full hit envelope
    pub fn envelope(&self) -> &Value {
        &self.envelope
    }
}

// ============================================================================
// Resume Cursor
// ============================================================================

/// Externally supplied ordering key a run resumes after.
///
/// Numeric input is sent as a number, anything else as a string. No check is
/// made against the backend: a cursor ahead of the true boundary skips records,
/// one behind it re-exports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeCursor(Value);

impl ResumeCursor {
    /// Create a cursor from a raw JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Cursor just before the given key: the primary component minus one unit.
    ///
    /// Only integer primaries can be stepped back; other keys return `None`.
    pub fn before(key: &SortKey) -> Option<Self> {
        let primary = key.primary()?.as_i64()?;
        Some(Self(Value::from(primary - 1)))
    }

    /// The raw cursor value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// The cursor as a `search_after` array
    pub fn to_search_after(&self) -> Value {
        Value::Array(vec![self.0.clone()])
    }
}

impl FromStr for ResumeCursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_value("after", "resume cursor is empty"));
        }
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Self(Value::from(n)));
        }
        Ok(Self(Value::String(s.to_string())))
    }
}

impl fmt::Display for ResumeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

// ============================================================================
// Keep-Alive
// ============================================================================

static KEEP_ALIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(d|h|m|s|ms|micros|nanos)$").expect("keep-alive pattern is valid")
});

/// Backend time unit string for how long a cursor session stays open (e.g. `1m`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeepAlive(String);

impl KeepAlive {
    /// The keep-alive as sent to the backend
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The keep-alive window as a duration
    pub fn duration(&self) -> Duration {
        // Only values that parse into a duration are ever constructed
        parse_keep_alive(&self.0).unwrap_or(Duration::ZERO)
    }
}

/// `None` when the string is not a time unit or the amount overflows
fn parse_keep_alive(s: &str) -> Option<Duration> {
    let caps = KEEP_ALIVE_RE.captures(s)?;
    let amount: u64 = caps[1].parse().ok()?;
    let duration = match &caps[2] {
        "d" => Duration::from_secs(amount.checked_mul(86_400)?),
        "h" => Duration::from_secs(amount.checked_mul(3_600)?),
        "m" => Duration::from_secs(amount.checked_mul(60)?),
        "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "micros" => Duration::from_micros(amount),
        _ => Duration::from_nanos(amount),
    };
    Some(duration)
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self("1m".to_string())
    }
}

impl FromStr for KeepAlive {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !KEEP_ALIVE_RE.is_match(s) {
            return Err(Error::invalid_value(
                "keep_alive",
                format!("'{s}' is not a time unit like 30s, 1m or 2h"),
            ));
        }
        if parse_keep_alive(s).is_none() {
            return Err(Error::invalid_value("keep_alive", format!("'{s}' is too long")));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for KeepAlive {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<KeepAlive> for String {
    fn from(keep_alive: KeepAlive) -> Self {
        keep_alive.0
    }
}

impl fmt::Display for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Failure Mode
// ============================================================================

/// How partial shard failures are treated during an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Retry the same page after a cooldown, abort after too many in a row
    #[default]
    Strict,
    /// Accept whatever the healthy shards return; completeness is not guaranteed
    Ignore,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}
