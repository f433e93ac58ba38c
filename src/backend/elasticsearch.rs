//! Elasticsearch backend
//!
//! Point-in-time sessions (`POST /{index}/_pit`) and `search_after` paging
//! over `GET /_search`.

use super::types::{CursorSession, PageResult};
use super::SearchBackend;
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::query::PageRequest;
use crate::types::KeepAlive;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct OpenPitResponse {
    id: Option<String>,
}

/// Elasticsearch-compatible backend over HTTP
#[derive(Debug)]
pub struct EsBackend {
    client: HttpClient,
}

impl EsBackend {
    /// Wrap an existing HTTP client; its base URL must point at the backend
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build a backend from connection settings
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let http_config = HttpClientConfig::builder()
            .base_url(config.base_url()?)
            .timeout(config.timeout())
            .build();
        let client = HttpClient::with_auth(http_config, config.auth()?)?;
        Ok(Self::new(client))
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Plain search against an index (`POST /{index}/_search`)
    pub async fn search_index(&self, index: &str, body: Value) -> Result<Value> {
        self.client
            .post_json(&format!("/{index}/_search"), RequestConfig::new().json(body))
            .await
    }
}

#[async_trait]
impl SearchBackend for EsBackend {
    async fn open_session(&self, index: &str, keep_alive: &KeepAlive) -> Result<CursorSession> {
        let response: OpenPitResponse = self
            .client
            .post_json(
                &format!("/{index}/_pit"),
                RequestConfig::new().query("keep_alive", keep_alive.as_str()),
            )
            .await?;

        let id = response
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::malformed("point-in-time response without id"))?;

        info!(index, keep_alive = %keep_alive, "Opened point-in-time session");
        Ok(CursorSession::new(id, keep_alive.clone()))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        let body: Value = self
            .client
            .get_json("/_search", RequestConfig::new().json(request.body()))
            .await?;

        let page = PageResult::from_response(body, request.session())?;
        debug!(
            hits = page.len(),
            shard_failures = page.shard_failures(),
            "Fetched page"
        );
        Ok(page)
    }
}
