//! Role cookie endpoints.
//!
//! The `user-roles` cookie is `HttpOnly`, so only the server can set it. The
//! client asks for it to be written after sign-in and cleared on sign-out.
//! The edge writes the roles the API confirms for the caller's bearer token;
//! roles in the request body are compared but never written.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::{Deserialize, Serialize};

use hireline_core::RoleSet;
use hireline_http::ErrorKind;

use crate::cookie::{clear_role_cookie, write_role_cookie};
use crate::error::{EdgeError, Result};
use crate::resolver::RoleResolver;
use crate::state::EdgeState;

/// Request and response body of the role cookie endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesBody {
    /// Roles in effect.
    #[serde(default)]
    pub roles: RoleSet,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Write the caller's confirmed roles into the role cookie.
///
/// ```text
/// PUT /session/roles
/// Authorization: Bearer <token>
/// {"roles": ["USER"]}
///
/// Response: 200 OK
/// Set-Cookie: user-roles=<signed>; HttpOnly; SameSite=Lax
/// {"roles": ["USER"]}
/// ```
///
/// # Errors
///
/// `401` without a bearer token or when the API rejects it (the cookie is
/// cleared in that case); `502` when the API cannot be reached.
pub async fn put_roles<R>(
    State(state): State<Arc<EdgeState<R>>>,
    headers: HeaderMap,
    body: Option<Json<RolesBody>>,
) -> Result<Response>
where
    R: RoleResolver + 'static,
{
    let Some(token) = bearer_token(&headers) else {
        return Err(EdgeError::Unauthorized);
    };

    let confirmed = match state.resolver.resolve(token).await {
        Ok(roles) => roles,
        Err(err) if matches!(err.kind, ErrorKind::Unauthorized | ErrorKind::Forbidden) => {
            tracing::info!(kind = %err.kind, "Caller token rejected, clearing role cookie");
            return Ok((clear_role_cookie(&state.config), EdgeError::Unauthorized).into_response());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(Json(requested)) = body {
        if requested.roles != confirmed {
            tracing::warn!(
                requested = %requested.roles.to_cookie_value(),
                confirmed = %confirmed.to_cookie_value(),
                "Requested roles differ from confirmed roles"
            );
        }
    }

    let jar = write_role_cookie(
        SignedCookieJar::new(state.cookie_key.clone()),
        &confirmed,
        &state.config,
    );
    tracing::debug!(roles = %confirmed.to_cookie_value(), "Role cookie written");
    Ok((jar, Json(RolesBody { roles: confirmed })).into_response())
}

/// Expire the role cookie.
///
/// ```text
/// DELETE /session/roles
///
/// Response: 200 OK
/// Set-Cookie: user-roles=; Max-Age=0; ...
/// {"roles": []}
/// ```
///
pub async fn delete_roles<R>(State(state): State<Arc<EdgeState<R>>>) -> Response
where
    R: RoleResolver + 'static,
{
    tracing::debug!("Role cookie cleared");
    (clear_role_cookie(&state.config), Json(RolesBody::default())).into_response()
}
