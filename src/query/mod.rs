//! Query module
//!
//! Builds the paginated search request and keeps its resume state.
//!
//! # Overview
//!
//! A `PageRequest` carries everything one page fetch needs: page size, the
//! single ascending sort, the optional filter and extra fragment, the cursor
//! session and the `search_after` key. After each emitted page the engine
//! calls [`PageRequest::advance`]; a page that has to be retried is re-sent
//! unchanged.

mod request;

pub use request::PageRequest;
