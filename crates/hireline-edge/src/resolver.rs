//! Server-side role lookup.
//!
//! The edge never writes roles a client asserts. It asks the API who owns the
//! caller's bearer token and writes the roles the API reports.

use std::sync::Arc;

use async_trait::async_trait;

use hireline_core::{Identity, RoleSet};
use hireline_http::{ApiError, HttpGateway, RequestOptions, TokenSource};

/// Resolves the roles that belong to a bearer token.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// Look up the roles of the account owning `bearer`.
    ///
    /// # Errors
    ///
    /// Returns `UNAUTHORIZED` or `FORBIDDEN` if the API rejects the token,
    /// or another classified error if the lookup fails.
    async fn resolve(&self, bearer: &str) -> Result<RoleSet, ApiError>;
}

/// Resolves roles through the API's identity endpoint.
#[derive(Debug, Clone)]
pub struct HttpRoleResolver {
    gateway: HttpGateway,
    identity_endpoint: String,
}

impl HttpRoleResolver {
    /// Create a resolver calling `identity_endpoint` through `gateway`.
    #[must_use]
    pub fn new(gateway: HttpGateway, identity_endpoint: impl Into<String>) -> Self {
        Self {
            gateway,
            identity_endpoint: identity_endpoint.into(),
        }
    }
}

struct CallerToken(String);

impl TokenSource for CallerToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[async_trait]
impl RoleResolver for HttpRoleResolver {
    async fn resolve(&self, bearer: &str) -> Result<RoleSet, ApiError> {
        let gateway = self
            .gateway
            .with_token_source(Arc::new(CallerToken(bearer.to_string())));
        let identity: Identity = gateway
            .request_as(&self.identity_endpoint, RequestOptions::get())
            .await?;
        tracing::debug!(user_id = %identity.id, roles = %identity.roles.to_cookie_value(), "Resolved caller roles");
        Ok(identity.roles)
    }
}
