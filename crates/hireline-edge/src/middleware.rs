//! Guard middleware for page requests.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::cookie::roles_from_headers;
use crate::guard::{evaluate, Decision, GuardRequest};
use crate::resolver::RoleResolver;
use crate::state::EdgeState;

/// Apply the route guard before the page handler runs.
///
/// Redirects are `307 Temporary Redirect`; everything else reaches `next`.
pub async fn route_guard<R>(
    State(state): State<Arc<EdgeState<R>>>,
    request: Request,
    next: Next,
) -> Response
where
    R: RoleResolver + 'static,
{
    let guard_request = GuardRequest::from_parts(request.uri(), request.headers());
    let roles = roles_from_headers(request.headers(), &state.cookie_key);

    match evaluate(&state.policy, &guard_request, &roles) {
        Decision::PassThrough => {
            tracing::debug!(path = %guard_request.path, "Guard passed request");
            next.run(request).await
        }
        Decision::Redirect(target) => {
            tracing::debug!(
                path = %guard_request.path,
                roles = %roles.to_cookie_value(),
                target = %target,
                "Guard redirected request"
            );
            Redirect::temporary(&target).into_response()
        }
    }
}
