//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, health, role_cookie};
use crate::middleware::route_guard;
use crate::resolver::RoleResolver;
use crate::state::EdgeState;

/// Create the edge router.
///
/// # Routes
///
/// ## Edge
/// - `GET /health` - Health check
/// - `PUT /session/roles` - Write the caller's confirmed roles into the cookie
/// - `DELETE /session/roles` - Clear the role cookie
///
/// ## Pages
/// Everything else goes to `pages` behind the route guard. Pass `None` to
/// mount a fallback that answers `404`.
pub fn create_router<R>(state: EdgeState<R>, pages: Option<Router>) -> Router
where
    R: RoleResolver + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;
    let state = Arc::new(state);

    let pages = pages
        .unwrap_or_else(|| Router::new().fallback(handlers::pages::not_rendered))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            route_guard::<R>,
        ));

    let edge = Router::new()
        .route("/health", get(health::health::<R>))
        .route(
            "/session/roles",
            put(role_cookie::put_roles::<R>).delete(role_cookie::delete_roles::<R>),
        )
        .with_state(state);

    edge.merge(pages)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
}

/// Build the CORS layer from configured origins.
///
/// No origins means no cross-origin access.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, HeaderValue, Request, StatusCode};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::{Key, SignedCookieJar};
    use hireline_core::{RoleSet, RoleTag};
    use tower::ServiceExt;

    use crate::config::EdgeConfig;
    use crate::cookie::write_role_cookie;
    use crate::resolver::fixed::FixedRoleResolver;

    fn app() -> (Router, Key) {
        let resolver =
            FixedRoleResolver::default().with("member", [RoleTag::User].into_iter().collect());
        let state = EdgeState::new(Arc::new(resolver), EdgeConfig::default()).unwrap();
        let key = state.cookie_key.clone();
        let pages = Router::new().fallback(|| async { "page" });
        (create_router(state, Some(pages)), key)
    }

    fn signed(key: &Key, tags: &[RoleTag]) -> String {
        let roles: RoleSet = tags.iter().cloned().collect();
        let jar = write_role_cookie(SignedCookieJar::new(key.clone()), &roles, &EdgeConfig::default());
        let response = jar.into_response();
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn page(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn guard_redirects_with_307() {
        let (app, _) = app();
        let response = app.oneshot(page("/admin", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?returnTo=%2Fadmin"
        );
    }

    #[tokio::test]
    async fn guard_passes_signed_admin() {
        let (app, key) = app();
        let cookie = signed(&key, &[RoleTag::Admin]);
        let response = app.oneshot(page("/talents", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"page");
    }

    #[tokio::test]
    async fn hand_written_cookie_is_signed_out() {
        let (app, _) = app();
        let response = app
            .oneshot(page("/admin/users", Some(r#"user-roles=["ADMIN"]"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?returnTo=%2Fadmin%2Fusers"
        );
    }

    #[tokio::test]
    async fn unnormalized_paths_are_guarded() {
        for path in ["//admin", "/./admin", "/%61dmin"] {
            let (app, _) = app();
            let response = app.oneshot(page(path, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
            assert_eq!(
                response.headers()[header::LOCATION],
                "/login?returnTo=%2Fadmin"
            );
        }
    }

    #[tokio::test]
    async fn edge_routes_skip_the_guard() {
        let (app, _) = app();
        let response = app.oneshot(page("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn default_pages_fallback_is_not_found() {
        let state = EdgeState::new(
            Arc::new(FixedRoleResolver::default()),
            EdgeConfig::default(),
        )
        .unwrap();
        let response = create_router(state, None)
            .oneshot(page("/talents", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn cors_request() -> Request<Body> {
        Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://hireline.dev")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let config = EdgeConfig {
            cors_origins: vec!["https://hireline.dev".to_string()],
            ..EdgeConfig::default()
        };
        let state = EdgeState::new(Arc::new(FixedRoleResolver::default()), config).unwrap();
        let response = create_router(state, None).oneshot(cors_request()).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            HeaderValue::from_static("https://hireline.dev")
        );
    }

    #[tokio::test]
    async fn no_origins_configured_denies_cors() {
        let state =
            EdgeState::new(Arc::new(FixedRoleResolver::default()), EdgeConfig::default()).unwrap();
        let response = create_router(state, None).oneshot(cors_request()).await.unwrap();

        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
