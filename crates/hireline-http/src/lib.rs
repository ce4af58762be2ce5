//! Outbound HTTP request gateway for hireline.
//!
//! Every call the client makes to the marketplace API goes through
//! [`HttpGateway::request`]. The gateway:
//!
//! - attaches `Authorization: Bearer <token>` when a [`TokenSource`] has one
//! - bounds the call with a timeout
//! - classifies every failure into an [`ErrorKind`]
//!
//! It never retries; retry policy belongs to the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hireline_http::{ClientConfig, HttpGateway, NoToken, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new(ClientConfig::default(), Arc::new(NoToken))?;
//! let body = gateway.request("/jobs", RequestOptions::get()).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod gateway;

use std::time::Duration;

use serde::Deserialize;

pub use error::{ApiError, ErrorKind, Result};
pub use gateway::{HttpGateway, NoToken, RequestOptions, TokenSource};
pub use reqwest::Method;

/// Configuration for the outbound gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the marketplace API (e.g., `https://api.hireline.dev`).
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Default per-request timeout in milliseconds.
    #[serde(default = "ClientConfig::default_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Keep cookies set by the API (the refresh credential lives in one).
    #[serde(default = "ClientConfig::default_cookie_store")]
    pub cookie_store: bool,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    const fn default_timeout_ms() -> u64 {
        10_000
    }

    const fn default_cookie_store() -> bool {
        true
    }

    /// Create a configuration for the given base URL with default settings.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Get the default request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Join an endpoint onto the base URL.
    ///
    /// Absolute `http(s)://` endpoints are returned unchanged.
    #[must_use]
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_ms: Self::default_timeout_ms(),
            cookie_store: Self::default_cookie_store(),
        }
    }
}
