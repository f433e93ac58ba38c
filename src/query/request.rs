//! Page request state and body rendering

use crate::backend::CursorSession;
use crate::config::{ExportConfig, RESERVED_BODY_KEYS};
use crate::types::{JsonObject, SortKey};
use serde_json::{json, Value};
use tracing::warn;

/// Per-iteration search request
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    page_size: u32,
    sort_field: String,
    query: Option<Value>,
    extra: Option<JsonObject>,
    search_after: Option<Value>,
    session: CursorSession,
    track_total_hits: Option<bool>,
}

impl PageRequest {
    /// Build the first request of a run.
    ///
    /// The resume cursor, if any, becomes the initial `search_after`.
    pub fn new(config: &ExportConfig, session: CursorSession) -> Self {
        for key in config.reserved_extra_keys() {
            warn!("Ignoring '{key}' in the extra request fragment, it is managed by the exporter");
        }

        Self {
            page_size: config.page_size,
            sort_field: config.sort_field.clone(),
            query: config.query.clone(),
            extra: config.extra.clone(),
            search_after: config.resume.as_ref().map(|cursor| cursor.to_search_after()),
            session,
            track_total_hits: None,
        }
    }

    /// Hits requested per page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Current cursor session
    pub fn session(&self) -> &CursorSession {
        &self.session
    }

    /// Current `search_after` value
    pub fn search_after(&self) -> Option<&Value> {
        self.search_after.as_ref()
    }

    /// Whether total hit tracking was switched off
    pub fn track_total_hits(&self) -> Option<bool> {
        self.track_total_hits
    }

    /// Move past an emitted page.
    ///
    /// The session is replaced by the one the page came back with and the
    /// cursor jumps to the last hit's key. Total hit counting is switched off
    /// for every later page unless the extra fragment sets it explicitly.
    pub fn advance(&mut self, last_key: Option<&SortKey>, next_session: CursorSession) {
        self.session = next_session;
        if let Some(key) = last_key {
            self.search_after = Some(key.cursor());
        }
        let user_set = self
            .extra
            .as_ref()
            .is_some_and(|extra| extra.contains_key("track_total_hits"));
        if !user_set {
            self.track_total_hits = Some(false);
        }
    }

    /// Render the JSON body of the `_search` call
    pub fn body(&self) -> Value {
        let mut body = JsonObject::new();
        body.insert("size".to_string(), json!(self.page_size));
        body.insert(
            "pit".to_string(),
            json!({
                "id": self.session.id(),
                "keep_alive": self.session.keep_alive().as_str(),
            }),
        );
        let mut sort = JsonObject::new();
        sort.insert(self.sort_field.clone(), json!("asc"));
        body.insert("sort".to_string(), json!([sort]));

        if let Some(query) = &self.query {
            body.insert("query".to_string(), query.clone());
        }

        if let Some(extra) = &self.extra {
            for (key, value) in extra {
                if !RESERVED_BODY_KEYS.contains(&key.as_str()) {
                    body.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(search_after) = &self.search_after {
            body.insert("search_after".to_string(), search_after.clone());
        }

        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), json!(track));
        }

        Value::Object(body)
    }
}
