//! Edge application state.

use std::sync::Arc;

use axum_extra::extract::cookie::Key;

use crate::config::EdgeConfig;
use crate::error::Result;
use crate::policy::RoutePolicy;
use crate::resolver::RoleResolver;

/// Shared application state for the edge.
pub struct EdgeState<R>
where
    R: RoleResolver,
{
    /// Confirms a caller's roles with the API.
    pub resolver: Arc<R>,
    /// Route policy applied to page requests.
    pub policy: Arc<RoutePolicy>,
    /// Signs and verifies the role cookie.
    pub cookie_key: Key,
    /// Edge configuration.
    pub config: EdgeConfig,
}

impl<R> EdgeState<R>
where
    R: RoleResolver,
{
    /// Create a new edge state with the default route policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured cookie secret is unusable.
    pub fn new(resolver: Arc<R>, config: EdgeConfig) -> Result<Self> {
        Ok(Self {
            resolver,
            policy: Arc::new(RoutePolicy::default()),
            cookie_key: config.cookie_key()?,
            config,
        })
    }

    /// Replace the route policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RoutePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}

impl<R> Clone for EdgeState<R>
where
    R: RoleResolver,
{
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            policy: Arc::clone(&self.policy),
            cookie_key: self.cookie_key.clone(),
            config: self.config.clone(),
        }
    }
}
