//! Client-side session management for hireline.
//!
//! This crate keeps the signed-in state consistent across the stores it
//! coordinates:
//!
//! - the in-memory bearer token and the persisted identity
//!   ([`CredentialStore`])
//! - the server-held refresh credential, reached only through
//!   [`AuthClient`]
//! - the HTTP-only role cookie the edge server reads ([`RoleCookieSync`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────┐
//! │  SessionManager  │─────▶│  SessionBootstrapper │  (once per process)
//! │ login / logout / │      └──────────┬───────────┘
//! │ recover          │                 │
//! └───────┬──────────┘                 │
//!         │               ┌────────────┼─────────────┐
//!         ▼               ▼            ▼             ▼
//!  ┌──────────────┐ ┌───────────┐ ┌──────────┐ ┌──────────────┐
//!  │ Credential   │ │ Identity  │ │ Auth     │ │ RoleCookie   │
//!  │ Store (mem)  │ │ Store     │ │ Client   │ │ Sync ──▶ edge│
//!  └──────────────┘ └───────────┘ └──────────┘ └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hireline_http::{ClientConfig, HttpGateway};
//! use hireline_session::{
//!     CredentialStore, FileIdentityStore, HttpAuthClient, HttpRoleCookieSync,
//!     SessionEndpoints, SessionManager,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(CredentialStore::open(Arc::new(FileIdentityStore::new(
//!     "/tmp/hireline/identity.json",
//! ))));
//! let api = HttpGateway::new(ClientConfig::default(), store.clone())?;
//! let edge = HttpGateway::new(ClientConfig::with_base_url("http://localhost:3000"), store.clone())?;
//!
//! let endpoints = SessionEndpoints::default();
//! let auth = Arc::new(HttpAuthClient::new(api, endpoints.clone()));
//! let cookies = Arc::new(HttpRoleCookieSync::new(edge, endpoints.role_cookie));
//!
//! let session = SessionManager::new(store, auth, cookies);
//! let state = session.bootstrap().await;
//! println!("session: {state:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth_client;
pub mod bootstrap;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod role_cookie;

use serde::Deserialize;

pub use auth_client::{AuthClient, HttpAuthClient};
pub use bootstrap::{SessionBootstrapper, SessionState};
pub use credentials::{
    BearerToken, Credential, CredentialStore, FileIdentityStore, IdentityStore,
    MemoryIdentityStore,
};
pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use role_cookie::{HttpRoleCookieSync, RoleCookieBody, RoleCookieSync};

#[cfg(any(test, feature = "test-utils"))]
pub use auth_client::mock::MockAuthClient;
#[cfg(any(test, feature = "test-utils"))]
pub use role_cookie::recording::{CookieOp, RecordingRoleCookieSync};

/// Endpoint paths used by the session collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEndpoints {
    /// Refresh endpoint on the API.
    #[serde(default = "SessionEndpoints::default_refresh")]
    pub refresh: String,
    /// Logout endpoint on the API.
    #[serde(default = "SessionEndpoints::default_logout")]
    pub logout: String,
    /// Current-identity endpoint on the API.
    #[serde(default = "SessionEndpoints::default_identity")]
    pub identity: String,
    /// Role-cookie endpoint on the edge server.
    #[serde(default = "SessionEndpoints::default_role_cookie")]
    pub role_cookie: String,
}

impl SessionEndpoints {
    fn default_refresh() -> String {
        "/auth/refresh".to_string()
    }

    fn default_logout() -> String {
        "/auth/logout".to_string()
    }

    fn default_identity() -> String {
        "/auth/me".to_string()
    }

    fn default_role_cookie() -> String {
        "/session/roles".to_string()
    }
}

impl Default for SessionEndpoints {
    fn default() -> Self {
        Self {
            refresh: Self::default_refresh(),
            logout: Self::default_logout(),
            identity: Self::default_identity(),
            role_cookie: Self::default_role_cookie(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints() {
        let endpoints = SessionEndpoints::default();
        assert_eq!(endpoints.refresh, "/auth/refresh");
        assert_eq!(endpoints.logout, "/auth/logout");
        assert_eq!(endpoints.identity, "/auth/me");
        assert_eq!(endpoints.role_cookie, "/session/roles");
    }

    #[test]
    fn partial_endpoint_config() {
        let endpoints: SessionEndpoints =
            serde_json::from_str(r#"{"refresh":"/v2/auth/refresh"}"#).unwrap();
        assert_eq!(endpoints.refresh, "/v2/auth/refresh");
        assert_eq!(endpoints.logout, "/auth/logout");
    }
}
