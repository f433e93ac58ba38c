//! Authentication module
//!
//! Supports: HTTP Basic (`user:password` credentials), Elasticsearch API keys
//! and bearer tokens.
//!
//! The `Authenticator` applies the configured scheme to every outgoing request.

mod authenticator;

pub use authenticator::{AuthConfig, Authenticator};
