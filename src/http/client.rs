//! HTTP client
//!
//! One client per backend: every call takes a path relative to the backend's
//! base URL, carries the configured credentials, and decodes a JSON body.
//! Non-2xx answers become `Error::HttpStatus`.

use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest response body kept in an `HttpStatus` error
pub(super) const MAX_ERROR_BODY: usize = 2048;

/// Connection settings of an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Backend base URL, e.g. `https://es:9200`
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sent as `User-Agent`
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(100),
            user_agent: format!("esdump/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for [`HttpClientConfig`]
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the backend base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Query string and JSON body of one call
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl RequestConfig {
    /// Empty request: no query, no body
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP client bound to one backend
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
}

impl HttpClient {
    /// Client without authentication
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        Self::with_auth(config, AuthConfig::None)
    }

    /// Client that authenticates every request
    pub fn with_auth(config: HttpClientConfig, auth: AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            authenticator: Authenticator::new(auth),
        })
    }

    /// Connection settings
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Send one request.
    ///
    /// Sends exactly once. Transport failures surface as `Error::Http`, any
    /// non-2xx status as `Error::HttpStatus` carrying the (truncated) body.
    pub async fn send(&self, method: Method, path: &str, config: RequestConfig) -> Result<Response> {
        let url = self.url_for(path);
        let mut req = self.client.request(method.clone(), &url);
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        if let Some(body) = &config.body {
            req = req.json(body);
        }
        req = self.authenticator.apply(req);

        let start = Instant::now();
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), truncate(body)));
        }

        debug!(%method, %url, elapsed_ms = start.elapsed().as_millis() as u64, "Request succeeded");
        Ok(response)
    }

    /// Send one request and decode the JSON answer
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        config: RequestConfig,
    ) -> Result<T> {
        let response = self.send(method, path, config).await?;
        Ok(response.json().await?)
    }

    /// `GET` with JSON answer (Elasticsearch accepts a body on `GET`)
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, config: RequestConfig) -> Result<T> {
        self.send_json(Method::GET, path, config).await
    }

    /// `POST` with JSON answer
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, config: RequestConfig) -> Result<T> {
        self.send_json(Method::POST, path, config).await
    }

    fn url_for(&self, path: &str) -> String {
        match &self.config.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }
}

/// Cut an error body to `MAX_ERROR_BODY` bytes on a char boundary
pub(super) fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("auth", self.authenticator.config())
            .finish_non_exhaustive()
    }
}
