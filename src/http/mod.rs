//! HTTP client module
//!
//! Thin client over reqwest used to talk to the search backend.
//!
//! # Features
//!
//! - **Base URL joining**: requests take backend-relative paths
//! - **Authentication**: integration with the auth module
//! - **Error classification**: transport failures and non-2xx statuses become
//!   errors that report `is_backend_unavailable()`; nothing here retries, the
//!   export engine fails fast on them

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
