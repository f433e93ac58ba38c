//! Cursor session and page result types

use crate::error::{Error, Result};
use crate::types::{Hit, KeepAlive, SortKey};
use serde::Deserialize;
use serde_json::Value;

/// Backend-side snapshot handle plus its renewal window.
///
/// Opaque to the exporter: the id is passed back unchanged and replaced by
/// whatever id the next page returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSession {
    id: String,
    keep_alive: KeepAlive,
}

impl CursorSession {
    /// Create a session handle
    pub fn new(id: impl Into<String>, keep_alive: KeepAlive) -> Self {
        Self {
            id: id.into(),
            keep_alive,
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Renewal window sent with every page request
    pub fn keep_alive(&self) -> &KeepAlive {
        &self.keep_alive
    }

    /// Same window, new id
    #[must_use]
    pub fn renewed(&self, id: impl Into<String>) -> Self {
        Self::new(id, self.keep_alive.clone())
    }
}

/// One fetched page. Consumed within a single loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    hits: Vec<Hit>,
    shard_failures: u64,
    next_session: CursorSession,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    pit_id: Option<String>,
    #[serde(rename = "_shards")]
    shards: Option<ShardStats>,
    hits: Option<HitsEnvelope>,
}

#[derive(Debug, Deserialize)]
struct ShardStats {
    #[serde(default)]
    failed: u64,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Value>,
}

impl PageResult {
    /// Create a page result
    pub fn new(hits: Vec<Hit>, shard_failures: u64, next_session: CursorSession) -> Self {
        Self {
            hits,
            shard_failures,
            next_session,
        }
    }

    /// Decode a `_search` response body.
    ///
    /// `pit_id`, `_shards` and `hits.hits` are required; every hit must carry a sort key.
    pub fn from_response(body: Value, current: &CursorSession) -> Result<Self> {
        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| Error::malformed(format!("unexpected search response: {e}")))?;

        let pit_id = response
            .pit_id
            .ok_or_else(|| Error::malformed("search response without pit_id"))?;
        let shards = response
            .shards
            .ok_or_else(|| Error::malformed("search response without _shards"))?;
        let envelope = response
            .hits
            .ok_or_else(|| Error::malformed("search response without hits"))?;

        let hits = envelope
            .hits
            .into_iter()
            .map(Hit::from_envelope)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            hits,
            shard_failures: shards.failed,
            next_session: current.renewed(pit_id),
        })
    }

    /// Hits in backend order
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Number of hits
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the page has no hits
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of shards that failed to answer
    pub fn shard_failures(&self) -> u64 {
        self.shard_failures
    }

    /// Session to use for the next request
    pub fn next_session(&self) -> &CursorSession {
        &self.next_session
    }

    /// Sort key of the first hit
    pub fn first_key(&self) -> Option<&SortKey> {
        self.hits.first().map(Hit::sort_key)
    }

    /// Sort key of the last hit
    pub fn last_key(&self) -> Option<&SortKey> {
        self.hits.last().map(Hit::sort_key)
    }
}
