//! The `user-roles` cookie as the edge writes and reads it.
//!
//! The cookie is signed with the edge's key. A value the client wrote itself,
//! or one that was altered, fails verification and reads as zero roles.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use time::Duration;

use hireline_core::{RoleSet, ROLE_COOKIE_NAME};

use crate::config::EdgeConfig;

/// Roles carried by the request's role cookie; zero roles if absent,
/// unsigned, tampered with, or malformed.
#[must_use]
pub fn roles_from_headers(headers: &HeaderMap, key: &Key) -> RoleSet {
    let jar = SignedCookieJar::from_headers(headers, key.clone());
    let cookie = jar.get(ROLE_COOKIE_NAME);
    RoleSet::from_optional_cookie(cookie.as_ref().map(Cookie::value))
}

/// Add the signed role cookie holding `roles` to `jar`.
#[must_use]
pub fn write_role_cookie(
    jar: SignedCookieJar,
    roles: &RoleSet,
    config: &EdgeConfig,
) -> SignedCookieJar {
    let mut cookie = role_cookie(roles.to_cookie_value(), config);
    let max_age = i64::try_from(config.role_cookie_max_age_seconds).unwrap_or(i64::MAX);
    cookie.set_max_age(Duration::seconds(max_age));
    jar.add(cookie)
}

/// A jar that expires the role cookie.
///
/// The removal carries no roles, so it is not signed.
#[must_use]
pub fn clear_role_cookie(config: &EdgeConfig) -> CookieJar {
    let mut cookie = role_cookie(String::new(), config);
    cookie.make_removal();
    CookieJar::new().add(cookie)
}

fn role_cookie(value: String, config: &EdgeConfig) -> Cookie<'static> {
    Cookie::build((ROLE_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .build()
}
