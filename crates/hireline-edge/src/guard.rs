//! Edge route guard.
//!
//! Given a request and the roles read from the `user-roles` cookie, decide
//! whether the request passes or is redirected. The roles are trusted only
//! for routing; the API re-checks every data request. Evaluation is pure:
//! no I/O, no shared state, and no failure path.

use axum::http::{HeaderMap, Uri};

use hireline_core::{RoleSet, RoleTag};

use crate::policy::{matches_prefix, PolicyStep, RoutePolicy, RouteTables};

/// Headers that mark a speculative prefetch.
const PREFETCH_HEADERS: [&str; 2] = ["next-router-prefetch", "x-middleware-prefetch"];

/// Headers whose value `prefetch` marks a speculative prefetch.
const PURPOSE_HEADERS: [&str; 2] = ["purpose", "sec-purpose"];

/// The parts of a request the guard looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRequest {
    /// Request path.
    pub path: String,
    /// Raw query string, without `?`.
    pub query: Option<String>,
    /// Whether the request is a speculative prefetch.
    pub is_prefetch: bool,
}

impl GuardRequest {
    /// A plain navigation to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
            is_prefetch: false,
        }
    }

    /// Attach a query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Build from an HTTP request's URI and headers.
    ///
    /// The path is normalized with [`normalize_path`] so that spellings such
    /// as `//admin` or `/%61dmin` meet the same rules as `/admin`.
    #[must_use]
    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        let is_prefetch = PREFETCH_HEADERS.iter().any(|h| headers.contains_key(*h))
            || PURPOSE_HEADERS.iter().any(|h| {
                headers
                    .get(*h)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.to_ascii_lowercase().contains("prefetch"))
            });
        Self {
            path: normalize_path(uri.path()),
            query: uri.query().filter(|q| !q.is_empty()).map(str::to_string),
            is_prefetch,
        }
    }

    /// Path plus `?query` when there is one.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

/// Canonical form of a request path.
///
/// Percent-escapes of unreserved characters are decoded, empty and `.`
/// segments are dropped and `..` removes the segment before it. Reserved
/// escapes such as `%2F` are kept.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let decoded = decode_unreserved(raw);
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::with_capacity(decoded.len()), |mut path, s| {
        path.push('/');
        path.push_str(s);
        path
    })
}

fn decode_unreserved(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let unreserved = raw
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .filter(|&b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));
            if let Some(byte) = unreserved {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The guard's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    PassThrough,
    /// Send the browser to this location.
    Redirect(String),
}

/// Evaluate `policy` for a request carrying `roles`.
///
/// An empty role set means signed out.
#[must_use]
pub fn evaluate(policy: &RoutePolicy, request: &GuardRequest, roles: &RoleSet) -> Decision {
    let tables = &policy.tables;
    for step in &policy.steps {
        let decision = match step {
            PolicyStep::Internal => {
                if request.is_prefetch || tables.is_internal(&request.path) {
                    return Decision::PassThrough;
                }
                None
            }
            PolicyStep::Legacy => legacy(tables, request),
            PolicyStep::GuestOnly => guest_only(tables, request, roles),
            PolicyStep::MemberNamespace => member_namespace(tables, request, roles),
            PolicyStep::AuthRequired => auth_required(tables, request, roles),
            PolicyStep::RoleGated => role_gated(tables, request, roles),
        };
        if let Some(target) = decision {
            return Decision::Redirect(target);
        }
    }
    Decision::PassThrough
}

fn legacy(tables: &RouteTables, request: &GuardRequest) -> Option<String> {
    let rule = tables
        .legacy
        .iter()
        .find(|rule| matches_prefix(&request.path, &rule.from))?;
    let suffix = &request.path[rule.from.trim_end_matches('/').len()..];
    let mut target = format!("{}{suffix}", rule.to.trim_end_matches('/'));
    if target.is_empty() {
        target.push('/');
    }
    if let Some(query) = &request.query {
        target.push('?');
        target.push_str(query);
    }
    Some(target)
}

fn guest_only(tables: &RouteTables, request: &GuardRequest, roles: &RoleSet) -> Option<String> {
    if roles.is_empty() || !tables.is_guest_only(&request.path) {
        return None;
    }
    Some(home_for(tables, roles))
}

fn member_namespace(
    tables: &RouteTables,
    request: &GuardRequest,
    roles: &RoleSet,
) -> Option<String> {
    let exempt = roles.contains(&RoleTag::Admin);
    if exempt
        || !roles.has_member_role()
        || tables.in_member_namespace(&request.path)
        || tables.is_protected(&request.path)
        || tables.is_guest_only(&request.path)
    {
        return None;
    }
    Some(tables.member_home.clone())
}

fn auth_required(tables: &RouteTables, request: &GuardRequest, roles: &RoleSet) -> Option<String> {
    let required = tables
        .auth_required
        .iter()
        .any(|prefix| matches_prefix(&request.path, prefix));
    (required && roles.is_empty()).then(|| login_redirect(tables, request))
}

fn role_gated(tables: &RouteTables, request: &GuardRequest, roles: &RoleSet) -> Option<String> {
    let rule = tables
        .role_rules
        .iter()
        .find(|rule| matches_prefix(&request.path, &rule.prefix))?;
    if roles.is_empty() {
        return Some(login_redirect(tables, request));
    }
    (!roles.intersects(&rule.allowed)).then(|| rule.fallback.clone())
}

fn home_for(tables: &RouteTables, roles: &RoleSet) -> String {
    if roles.has_member_role() {
        tables.member_home.clone()
    } else {
        tables.default_home.clone()
    }
}

fn login_redirect(tables: &RouteTables, request: &GuardRequest) -> String {
    format!(
        "{}?returnTo={}",
        tables.login_path,
        urlencoding::encode(&request.path_and_query())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn roles(tags: &[RoleTag]) -> RoleSet {
        tags.iter().cloned().collect()
    }

    fn decide(path: &str, tags: &[RoleTag]) -> Decision {
        evaluate(&RoutePolicy::default(), &GuardRequest::new(path), &roles(tags))
    }

    fn redirect(target: &str) -> Decision {
        Decision::Redirect(target.to_string())
    }

    #[test]
    fn signed_out_admin_goes_to_login() {
        assert_eq!(decide("/admin", &[]), redirect("/login?returnTo=%2Fadmin"));
    }

    #[test]
    fn member_is_kept_in_member_area() {
        assert_eq!(decide("/talents", &[RoleTag::User]), redirect("/dashboard"));
        assert_eq!(decide("/", &[RoleTag::JoinedUser]), redirect("/dashboard"));
        assert_eq!(decide("/dashboard/jobs", &[RoleTag::User]), Decision::PassThrough);
    }

    #[test]
    fn admin_is_exempt_from_member_area() {
        assert_eq!(decide("/talents", &[RoleTag::Admin]), Decision::PassThrough);
        assert_eq!(
            decide("/talents", &[RoleTag::Admin, RoleTag::User]),
            Decision::PassThrough
        );
    }

    #[test]
    fn company_cannot_enter_admin() {
        assert_eq!(decide("/admin", &[RoleTag::Company]), redirect("/"));
        assert_eq!(decide("/company/postings", &[RoleTag::Company]), Decision::PassThrough);
    }

    #[test]
    fn member_is_refused_company_area() {
        assert_eq!(decide("/company", &[RoleTag::User]), redirect("/"));
    }

    #[test]
    fn return_to_keeps_query() {
        let request = GuardRequest::new("/account/settings").with_query("tab=email&x=1");
        assert_eq!(
            evaluate(&RoutePolicy::default(), &request, &RoleSet::new()),
            redirect("/login?returnTo=%2Faccount%2Fsettings%3Ftab%3Demail%26x%3D1")
        );
    }

    #[test]
    fn signed_in_users_leave_guest_pages() {
        assert_eq!(decide("/login", &[RoleTag::User]), redirect("/dashboard"));
        assert_eq!(decide("/signup", &[RoleTag::Company]), redirect("/"));
        assert_eq!(decide("/login", &[]), Decision::PassThrough);
    }

    #[test]
    fn legacy_rewrite_keeps_suffix_and_query() {
        let request = GuardRequest::new("/company/jobs/42/edit").with_query("draft=1");
        assert_eq!(
            evaluate(&RoutePolicy::default(), &request, &roles(&[RoleTag::Company])),
            redirect("/company/postings/42/edit?draft=1")
        );
        assert_eq!(decide("/mypage", &[]), redirect("/dashboard"));
    }

    #[test]
    fn legacy_runs_before_auth_checks() {
        assert_eq!(decide("/admin/members/3", &[]), redirect("/admin/users/3"));
        assert_eq!(decide("/admin/members", &[RoleTag::Company]), redirect("/admin/users"));
    }

    #[test]
    fn internal_and_prefetch_pass() {
        assert_eq!(decide("/api/jobs", &[]), Decision::PassThrough);
        assert_eq!(decide("/_next/data/x.json", &[RoleTag::User]), Decision::PassThrough);

        let prefetch = GuardRequest {
            is_prefetch: true,
            ..GuardRequest::new("/admin")
        };
        assert_eq!(
            evaluate(&RoutePolicy::default(), &prefetch, &RoleSet::new()),
            Decision::PassThrough
        );
    }

    #[test]
    fn prefix_is_segment_aware() {
        assert_eq!(decide("/administrator", &[]), Decision::PassThrough);
        assert_eq!(decide("/companyx", &[]), Decision::PassThrough);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let custom = roles(&["RECRUITER".parse().unwrap()]);
        assert_eq!(
            evaluate(&RoutePolicy::default(), &GuardRequest::new("/admin"), &custom),
            redirect("/")
        );
        assert_eq!(
            evaluate(&RoutePolicy::default(), &GuardRequest::new("/talents"), &custom),
            Decision::PassThrough
        );
    }

    #[test]
    fn step_order_is_precedence() {
        let mut policy = RoutePolicy::default();
        policy.steps.retain(|s| *s != PolicyStep::Legacy);
        assert_eq!(
            evaluate(&policy, &GuardRequest::new("/admin/members"), &RoleSet::new()),
            redirect("/login?returnTo=%2Fadmin%2Fmembers")
        );
    }

    #[test]
    fn path_spellings_meet_the_same_rules() {
        for raw in ["//admin", "/./admin", "/%61dmin", "/admin//users", "/x/../admin", "/%2e/admin"] {
            let uri: Uri = raw.parse().unwrap();
            let request = GuardRequest::from_parts(&uri, &HeaderMap::new());
            assert!(
                matches!(
                    evaluate(&RoutePolicy::default(), &request, &RoleSet::new()),
                    Decision::Redirect(ref target) if target.starts_with("/login?returnTo=%2Fadmin")
                ),
                "{raw} slipped past the guard"
            );
        }
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_path("//admin"), "/admin");
        assert_eq!(normalize_path("/./admin/"), "/admin");
        assert_eq!(normalize_path("/%61dmin"), "/admin");
        assert_eq!(normalize_path("/a/b/../../admin"), "/admin");
        assert_eq!(normalize_path("/../.."), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/files/a%2Fb"), "/files/a%2Fb");
        assert_eq!(normalize_path("/100%"), "/100%");
        assert_eq!(normalize_path("/%zz"), "/%zz");
    }

    #[test]
    fn request_from_parts() {
        let uri: Uri = "/admin/users?page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("sec-purpose", HeaderValue::from_static("prefetch;prerender"));

        let request = GuardRequest::from_parts(&uri, &headers);
        assert_eq!(request.path, "/admin/users");
        assert_eq!(request.query.as_deref(), Some("page=2"));
        assert!(request.is_prefetch);

        let plain = GuardRequest::from_parts(&uri, &HeaderMap::new());
        assert!(!plain.is_prefetch);
    }
}
