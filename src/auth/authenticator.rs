//! Authenticator implementation
//!
//! Handles applying authentication to requests.

use crate::error::{Error, Result};
use reqwest::RequestBuilder;
use std::fmt;

/// Authentication configuration
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Elasticsearch API key (the base64 `id:api_key` encoding)
    ApiKey {
        /// The encoded API key
        value: String,
    },
}

impl AuthConfig {
    /// Parse `user:password` credentials.
    ///
    /// Only the first colon separates the two parts, so passwords may contain colons.
    pub fn from_credentials(credentials: &str) -> Result<Self> {
        let (username, password) = credentials.split_once(':').ok_or_else(|| {
            Error::invalid_value("credentials", "expected the form user:password")
        })?;

        if username.is_empty() {
            return Err(Error::invalid_value("credentials", "username is empty"));
        }

        Ok(Self::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Check if any authentication is configured
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("value", &"***").finish(),
        }
    }
}

/// Authenticator handles applying authentication to HTTP requests
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Get the auth configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Apply authentication to a request builder
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config {
            AuthConfig::None => req,
            AuthConfig::Basic { username, password } => req.basic_auth(username, Some(password)),
            AuthConfig::ApiKey { value } => req.header("Authorization", format!("ApiKey {value}")),
        }
    }
}
