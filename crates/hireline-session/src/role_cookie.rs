//! Client side of the role cookie.
//!
//! The `user-roles` cookie is HTTP-only; script code cannot write it. The
//! client asks the edge server to set or clear it, and the edge writes the
//! roles it confirms with the API rather than the roles the client sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hireline_core::RoleSet;
use hireline_http::{ApiError, ErrorKind, HttpGateway, RequestOptions};

/// Mirrors the role set into the server-set role cookie.
#[async_trait]
pub trait RoleCookieSync: Send + Sync {
    /// Set the cookie to `roles`. Returns the roles the server wrote.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge server rejects or fails the call.
    async fn write(&self, roles: &RoleSet) -> Result<RoleSet, ApiError>;

    /// Expire the cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn clear(&self) -> Result<(), ApiError>;
}

/// Request and response body of the role-cookie endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCookieBody {
    /// Roles in effect.
    #[serde(default)]
    pub roles: RoleSet,
}

/// Role cookie sync over HTTP to the edge server.
///
/// The gateway must read its token from the credential store so the edge can
/// confirm the caller's roles.
#[derive(Debug, Clone)]
pub struct HttpRoleCookieSync {
    gateway: HttpGateway,
    endpoint: String,
}

impl HttpRoleCookieSync {
    /// Create a sync calling `endpoint` on the gateway's base URL.
    #[must_use]
    pub fn new(gateway: HttpGateway, endpoint: impl Into<String>) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RoleCookieSync for HttpRoleCookieSync {
    async fn write(&self, roles: &RoleSet) -> Result<RoleSet, ApiError> {
        let body = RoleCookieBody {
            roles: roles.clone(),
        };
        let value = self.gateway.put(&self.endpoint, &body).await?;
        let written: RoleCookieBody = serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                ErrorKind::UnknownError,
                format!("unexpected role cookie response: {e}"),
            )
        })?;

        if written.roles != *roles {
            tracing::warn!(
                requested = %roles.to_cookie_value(),
                written = %written.roles.to_cookie_value(),
                "Edge wrote different roles than requested"
            );
        }
        Ok(written.roles)
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.gateway
            .request(&self.endpoint, RequestOptions::delete())
            .await?;
        Ok(())
    }
}

/// Role cookie sync that records calls instead of making them.
#[cfg(any(test, feature = "test-utils"))]
pub mod recording {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use hireline_core::RoleSet;
    use hireline_http::{ApiError, ErrorKind};

    use super::RoleCookieSync;

    /// One recorded call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CookieOp {
        /// `write` with these roles.
        Write(RoleSet),
        /// `clear`.
        Clear,
    }

    /// Records every call; optionally fails all of them.
    #[derive(Debug, Default)]
    pub struct RecordingRoleCookieSync {
        ops: Mutex<Vec<CookieOp>>,
        fail: bool,
        confirmed: Option<RoleSet>,
    }

    impl RecordingRoleCookieSync {
        /// A sync that succeeds.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A sync whose calls are recorded and then fail with `NETWORK_ERROR`.
        #[must_use]
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// A sync that writes `roles` whatever it is asked to write, the way
        /// the edge writes what the API confirms.
        #[must_use]
        pub fn confirming(roles: RoleSet) -> Self {
            Self {
                confirmed: Some(roles),
                ..Self::default()
            }
        }

        /// Calls recorded so far.
        #[must_use]
        pub fn ops(&self) -> Vec<CookieOp> {
            self.ops.lock().clone()
        }

        /// The cookie as it would stand after the recorded calls.
        #[must_use]
        pub fn current(&self) -> Option<RoleSet> {
            match self.ops.lock().last() {
                Some(CookieOp::Write(roles)) if !self.fail => {
                    Some(self.confirmed.clone().unwrap_or_else(|| roles.clone()))
                }
                _ => None,
            }
        }
    }

    #[async_trait]
    impl RoleCookieSync for RecordingRoleCookieSync {
        async fn write(&self, roles: &RoleSet) -> Result<RoleSet, ApiError> {
            self.ops.lock().push(CookieOp::Write(roles.clone()));
            if self.fail {
                return Err(ApiError::new(ErrorKind::NetworkError, "edge unreachable"));
            }
            Ok(self.confirmed.clone().unwrap_or_else(|| roles.clone()))
        }

        async fn clear(&self) -> Result<(), ApiError> {
            self.ops.lock().push(CookieOp::Clear);
            if self.fail {
                return Err(ApiError::new(ErrorKind::NetworkError, "edge unreachable"));
            }
            Ok(())
        }
    }
}
