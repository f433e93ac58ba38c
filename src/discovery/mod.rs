//! Field discovery
//!
//! Lists every field path that occurs in the documents of an index, mapped or
//! not. The time range of the index is cut into fixed windows and each window
//! is summarised by a `terms` aggregation over a script that walks `_source`.
//! Small windows keep the load on the cluster low.

use crate::backend::EsBackend;
use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::progress::{Marker, NoProgress, ProgressReporter};
use chrono::{DateTime, Duration as TimeDelta, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Painless script returning every key path of `_source`, nested keys dotted
const FIELD_PATHS_SCRIPT: &str = r"
void recurse(def x, String base, List rv) {
    for (String k : x.keySet()) {
        rv.add(base + k);
        if (x[k] instanceof Map) {
            recurse(x[k], base + k + '.', rv);
        }
    }
}
List rv = new ArrayList();
recurse(params._source, '', rv);
return rv;
";

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
        .expect("timestamp pattern is valid")
});

/// Parse a millisecond-precision UTC timestamp (`2024-01-31T12:00:00.000Z`)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if !TIMESTAMP_RE.is_match(s) {
        return Err(Error::discovery(format!(
            "unsupported timestamp format '{s}', expected YYYY-MM-DDTHH:MM:SS.mmmZ"
        )));
    }
    let naive = NaiveDateTime::parse_from_str(&s[..s.len() - 1], "%Y-%m-%dT%H:%M:%S%.3f")
        .map_err(|e| Error::discovery(format!("invalid timestamp '{s}': {e}")))?;
    Ok(naive.and_utc())
}

/// Format a timestamp the way [`parse_timestamp`] reads it
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Walks an index window by window and collects field names
pub struct FieldDiscovery {
    backend: EsBackend,
    config: DiscoveryConfig,
    progress: Box<dyn ProgressReporter>,
}

impl FieldDiscovery {
    /// Create a discovery scan, validating the config
    pub fn new(backend: EsBackend, config: DiscoveryConfig) -> Result<Self> {
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

    /// Earliest and latest timestamp in the index, `None` when it is empty
    pub async fn time_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let Some(first) = self.edge_timestamp("asc").await? else {
            return Ok(None);
        };
        let Some(last) = self.edge_timestamp("desc").await? else {
            return Ok(None);
        };
        Ok(Some((first, last)))
    }

    async fn edge_timestamp(&self, order: &str) -> Result<Option<DateTime<Utc>>> {
        let field = &self.config.timestamp_field;
        let mut sort = serde_json::Map::new();
        sort.insert(field.clone(), json!(order));

        let mut body = json!({ "size": 1, "sort": [sort] });
        if let Some(query) = &self.config.query {
            body["query"] = query.clone();
        }

        let response = self.backend.search_index(&self.config.index, body).await?;
        let Some(hit) = response.pointer("/hits/hits/0") else {
            return Ok(None);
        };

        let raw = source_field(hit, field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::discovery(format!("document without a string '{field}' field"))
            })?;
        parse_timestamp(raw).map(Some)
    }

    /// Field names in `[start, end)`, growing the aggregation until it is
    /// no longer saturated
    pub async fn fields_in_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let query = self.window_query(&start, &end);
        let mut size = self.config.initial_agg_size;

        for attempt in 1..=self.config.max_attempts {
            let response = self
                .backend
                .search_index(&self.config.index, aggregation_body(&query, size))
                .await?;

            let buckets = response
                .pointer("/aggregations/fields/buckets")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::malformed("response without aggregations.fields.buckets"))?;

            if buckets.len() < size as usize {
                self.progress.mark(Marker::Ok);
                return Ok(buckets
                    .iter()
                    .filter_map(|bucket| bucket.get("key").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect());
            }

            self.progress.mark(Marker::Grow);
            debug!(attempt, size, "Field aggregation saturated, growing");
            size = size.saturating_mul(2);
        }

        Err(Error::discovery(format!(
            "window starting {} still has more fields than the aggregation can hold after {} attempts; use a smaller interval or a larger initial size",
            format_timestamp(&start),
            self.config.max_attempts
        )))
    }

    /// Run the scan over the whole index
    pub async fn run(&mut self) -> Result<BTreeSet<String>> {
        let mut fields = BTreeSet::new();

        let Some((first, last)) = self.time_range().await? else {
            info!(index = %self.config.index, "Index is empty, no fields to discover");
            return Ok(fields);
        };
        info!(
            from = %format_timestamp(&first),
            to = %format_timestamp(&last),
            "Scanning index for fields"
        );

        let step = TimeDelta::milliseconds(self.config.interval_ms as i64);
        let mut windows = 0usize;
        let mut current = first;
        while current <= last {
            let next = current + step;
            fields.extend(self.fields_in_window(current, next).await?);
            windows += 1;
            current = next;
        }
        self.progress.end_line();

        info!(windows, fields = fields.len(), "Field discovery finished");
        Ok(fields)
    }

    /// Range filter on the window, combined with the user query
    fn window_query(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Value {
        let mut range = serde_json::Map::new();
        range.insert(
            self.config.timestamp_field.clone(),
            json!({
                "gte": format_timestamp(start),
                "lt": format_timestamp(end),
            }),
        );

        let mut filters = vec![json!({ "range": range })];
        if let Some(query) = &self.config.query {
            filters.push(query.clone());
        }
        json!({ "bool": { "filter": filters } })
    }
}

/// Search body for one aggregation attempt
fn aggregation_body(query: &Value, size: u32) -> Value {
    json!({
        "size": 0,
        "query": query,
        "aggs": {
            "fields": {
                "terms": {
                    "size": size,
                    "script": {
                        "lang": "painless",
                        "source": FIELD_PATHS_SCRIPT,
                    }
                }
            }
        }
    })
}

/// Look up a possibly dotted field in a hit's `_source`
fn source_field<'a>(hit: &'a Value, field: &str) -> Option<&'a Value> {
    let source = hit.get("_source")?;
    if let Some(value) = source.get(field) {
        return Some(value);
    }
    field
        .split('.')
        .try_fold(source, |current, part| current.get(part))
}
