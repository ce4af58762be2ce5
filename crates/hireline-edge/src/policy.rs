//! Route policy tables and their evaluation order.
//!
//! A [`RoutePolicy`] is one ordered list of [`PolicyStep`]s over one set of
//! [`RouteTables`]. Precedence is the order of the list; every step reads the
//! same tables, so the member-namespace redirect can never disagree with the
//! auth and role gates about which paths are protected.

use hireline_core::{RoleSet, RoleTag};

/// A deprecated path prefix and its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRedirect {
    /// Deprecated prefix.
    pub from: String,
    /// Prefix it moved to.
    pub to: String,
}

impl LegacyRedirect {
    /// Create a redirect.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A path prefix reserved for some roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    /// Path prefix the rule covers.
    pub prefix: String,
    /// Roles allowed in.
    pub allowed: RoleSet,
    /// Where signed-in users without an allowed role are sent.
    pub fallback: String,
}

impl RoleRule {
    /// Create a rule.
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        allowed: impl IntoIterator<Item = RoleTag>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            allowed: allowed.into_iter().collect(),
            fallback: fallback.into(),
        }
    }
}

/// The path tables every step consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTables {
    /// Prefixes that bypass the guard entirely.
    pub internal_prefixes: Vec<String>,
    /// Deprecated prefixes, first match wins.
    pub legacy: Vec<LegacyRedirect>,
    /// Paths only signed-out visitors may see.
    pub guest_only: Vec<String>,
    /// Prefix of the member area.
    pub member_namespace: String,
    /// Landing page for members.
    pub member_home: String,
    /// Landing page for everyone else.
    pub default_home: String,
    /// Sign-in page.
    pub login_path: String,
    /// Prefixes that require any signed-in user.
    pub auth_required: Vec<String>,
    /// Role-gated prefixes, first match wins.
    pub role_rules: Vec<RoleRule>,
}

impl RouteTables {
    /// Returns `true` if the path is auth-required or role-gated.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.auth_required.iter().any(|p| matches_prefix(path, p))
            || self.role_rules.iter().any(|r| matches_prefix(path, &r.prefix))
    }

    /// Returns `true` if the path is guest-only.
    #[must_use]
    pub fn is_guest_only(&self, path: &str) -> bool {
        self.guest_only.iter().any(|p| matches_prefix(path, p))
    }

    /// Returns `true` if the path bypasses the guard.
    #[must_use]
    pub fn is_internal(&self, path: &str) -> bool {
        self.internal_prefixes.iter().any(|p| matches_prefix(path, p))
    }

    /// Returns `true` if the path lies inside the member area.
    #[must_use]
    pub fn in_member_namespace(&self, path: &str) -> bool {
        matches_prefix(path, &self.member_namespace)
    }
}

impl Default for RouteTables {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            internal_prefixes: strings(&[
                "/api",
                "/_next",
                "/static",
                "/assets",
                "/favicon.ico",
                "/robots.txt",
                "/health",
                "/session",
            ]),
            legacy: vec![
                LegacyRedirect::new("/mypage", "/dashboard"),
                LegacyRedirect::new("/company/jobs", "/company/postings"),
                LegacyRedirect::new("/admin/members", "/admin/users"),
            ],
            guest_only: strings(&["/login", "/signup"]),
            member_namespace: "/dashboard".to_string(),
            member_home: "/dashboard".to_string(),
            default_home: "/".to_string(),
            login_path: "/login".to_string(),
            auth_required: strings(&["/dashboard", "/account", "/onboarding"]),
            role_rules: vec![
                RoleRule::new("/admin", [RoleTag::Admin], "/"),
                RoleRule::new("/company", [RoleTag::Company, RoleTag::Admin], "/"),
                RoleRule::new(
                    "/dashboard",
                    [RoleTag::User, RoleTag::JoinedUser, RoleTag::Admin],
                    "/",
                ),
            ],
        }
    }
}

/// One stage of route evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStep {
    /// Prefetches and internal prefixes pass untouched.
    Internal,
    /// Deprecated prefixes move to their replacement.
    Legacy,
    /// Signed-in users leave the sign-in pages.
    GuestOnly,
    /// Members stay inside the member area.
    MemberNamespace,
    /// Signed-out visitors are sent to sign in.
    AuthRequired,
    /// Role-gated prefixes admit only their roles.
    RoleGated,
}

/// Ordered route policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Steps in precedence order.
    pub steps: Vec<PolicyStep>,
    /// Tables the steps read.
    pub tables: RouteTables,
}

impl RoutePolicy {
    /// The evaluation order used by the marketplace.
    pub const DEFAULT_STEPS: [PolicyStep; 6] = [
        PolicyStep::Internal,
        PolicyStep::Legacy,
        PolicyStep::GuestOnly,
        PolicyStep::MemberNamespace,
        PolicyStep::AuthRequired,
        PolicyStep::RoleGated,
    ];

    /// Create a policy with the default order over custom tables.
    #[must_use]
    pub fn with_tables(tables: RouteTables) -> Self {
        Self {
            steps: Self::DEFAULT_STEPS.to_vec(),
            tables,
        }
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::with_tables(RouteTables::default())
    }
}

/// Segment-aware prefix match.
///
/// `/admin` matches `/admin` and `/admin/users` but not `/administrator`.
#[must_use]
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
