//! Search backend module
//!
//! The export engine talks to the backend only through the [`SearchBackend`]
//! trait: open a cursor session, fetch one page. [`EsBackend`] implements it
//! over HTTP with point-in-time sessions and `search_after` paging.

mod elasticsearch;
mod types;

pub use elasticsearch::EsBackend;
pub use types::{CursorSession, PageResult};

use crate::error::Result;
use crate::query::PageRequest;
use crate::types::KeepAlive;
use async_trait::async_trait;

/// A backend that can serve a stable, paginated scan
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Open a cursor session (snapshot) over `index`
    async fn open_session(&self, index: &str, keep_alive: &KeepAlive) -> Result<CursorSession>;

    /// Fetch one page. Transport and HTTP errors are returned as errors;
    /// partial shard failures are reported inside the result.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult>;
}
