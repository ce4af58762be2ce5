//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::resolver::RoleResolver;
use crate::state::EdgeState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Number of steps in the active route policy.
    pub policy_steps: usize,
    /// Whether the role cookie is only sent over HTTPS.
    pub cookie_secure: bool,
}

/// Report liveness and the guard configuration in effect.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {"status": "healthy", "version": "0.1.0", "policy_steps": 6, "cookie_secure": true}
/// ```
pub async fn health<R>(State(state): State<Arc<EdgeState<R>>>) -> Json<HealthResponse>
where
    R: RoleResolver + 'static,
{
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        policy_steps: state.policy.steps.len(),
        cookie_secure: state.config.cookie_secure,
    })
}
