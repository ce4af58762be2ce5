//! Role tags and role sets.
//!
//! A role tag names one coarse permission class. The edge server mirrors the
//! signed-in account's role set into the [`ROLE_COOKIE_NAME`] cookie as a JSON
//! array; [`RoleSet::from_cookie_value`] is the only way that cookie is read
//! and it fails closed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of the cookie mirroring the current role set.
pub const ROLE_COOKIE_NAME: &str = "user-roles";

/// Cookie values longer than this are rejected outright.
const MAX_COOKIE_VALUE_LEN: usize = 4096;

/// A single role tag.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoleTag {
    /// Platform administrator.
    Admin,
    /// Hiring company account.
    Company,
    /// Talent (job seeker) account.
    User,
    /// Talent account that completed onboarding.
    JoinedUser,
    /// A tag this build does not know about. Never grants access by itself.
    Other(String),
}

impl RoleTag {
    /// Return the wire representation of the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::Company => "COMPANY",
            Self::User => "USER",
            Self::JoinedUser => "JOINEDUSER",
            Self::Other(tag) => tag,
        }
    }

    /// Returns `true` for the talent-side roles that live in the member namespace.
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self, Self::User | Self::JoinedUser)
    }
}

impl fmt::Debug for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleTag({})", self.as_str())
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "COMPANY" => Ok(Self::Company),
            "USER" => Ok(Self::User),
            "JOINEDUSER" => Ok(Self::JoinedUser),
            other
                if !other.is_empty()
                    && other
                        .bytes()
                        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_') =>
            {
                Ok(Self::Other(other.to_string()))
            }
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for RoleTag {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoleTag> for String {
    fn from(tag: RoleTag) -> Self {
        tag.as_str().to_string()
    }
}

/// An ordered, deduplicated set of role tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleTag>);

impl RoleSet {
    /// Create an empty role set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag. Returns `true` if it was not already present.
    pub fn insert(&mut self, tag: RoleTag) -> bool {
        self.0.insert(tag)
    }

    /// Remove a tag. Returns `true` if it was present.
    pub fn remove(&mut self, tag: &RoleTag) -> bool {
        self.0.remove(tag)
    }

    /// Check whether the set contains a tag.
    #[must_use]
    pub fn contains(&self, tag: &RoleTag) -> bool {
        self.0.contains(tag)
    }

    /// Check whether the two sets share at least one tag.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Returns `true` if any tag belongs to the member namespace.
    #[must_use]
    pub fn has_member_role(&self) -> bool {
        self.0.iter().any(RoleTag::is_member)
    }

    /// Returns `true` if the set carries no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the tags in order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleTag> {
        self.0.iter()
    }

    /// Serialize the set as the role cookie value (a JSON array of strings).
    #[must_use]
    pub fn to_cookie_value(&self) -> String {
        let tags: Vec<&str> = self.0.iter().map(RoleTag::as_str).collect();
        serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse a role cookie value.
    ///
    /// Accepts the raw JSON array or its percent-encoded form. Anything else,
    /// including an array holding a non-string or an invalid tag, yields an
    /// empty set. This never panics.
    #[must_use]
    pub fn from_cookie_value(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_COOKIE_VALUE_LEN {
            return Self::new();
        }

        let decoded = if raw.starts_with('[') {
            std::borrow::Cow::Borrowed(raw)
        } else {
            match urlencoding::decode(raw) {
                Ok(decoded) => decoded,
                Err(_) => return Self::new(),
            }
        };

        let Ok(values) = serde_json::from_str::<Vec<String>>(&decoded) else {
            return Self::new();
        };

        let mut set = Self::new();
        for value in values {
            match value.parse::<RoleTag>() {
                Ok(tag) => {
                    set.insert(tag);
                }
                Err(_) => return Self::new(),
            }
        }
        set
    }

    /// Parse an optional cookie value; a missing cookie means zero roles.
    #[must_use]
    pub fn from_optional_cookie(raw: Option<&str>) -> Self {
        raw.map(Self::from_cookie_value).unwrap_or_default()
    }
}

impl FromIterator<RoleTag> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a RoleTag;
    type IntoIter = std::collections::btree_set::Iter<'a, RoleTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tags: &[RoleTag]) -> RoleSet {
        tags.iter().cloned().collect()
    }

    #[test]
    fn known_tags_round_trip_through_strings() {
        for tag in [
            RoleTag::Admin,
            RoleTag::Company,
            RoleTag::User,
            RoleTag::JoinedUser,
        ] {
            assert_eq!(tag.as_str().parse::<RoleTag>().unwrap(), tag);
        }
    }

    #[test]
    fn unknown_upper_case_tags_are_preserved() {
        let tag: RoleTag = "RECRUITER_2".parse().unwrap();
        assert_eq!(tag, RoleTag::Other("RECRUITER_2".into()));
        assert!(!tag.is_member());
    }

    #[test]
    fn malformed_tags_are_rejected() {
        assert!("".parse::<RoleTag>().is_err());
        assert!("admin".parse::<RoleTag>().is_err());
        assert!("AD MIN".parse::<RoleTag>().is_err());
    }

    #[test]
    fn cookie_value_is_a_sorted_json_array() {
        let roles = set(&[RoleTag::User, RoleTag::Admin, RoleTag::User]);
        assert_eq!(roles.to_cookie_value(), r#"["ADMIN","USER"]"#);
        assert_eq!(RoleSet::new().to_cookie_value(), "[]");
    }

    #[test]
    fn parses_raw_and_percent_encoded_cookies() {
        let expected = set(&[RoleTag::Company]);
        assert_eq!(RoleSet::from_cookie_value(r#"["COMPANY"]"#), expected);
        assert_eq!(
            RoleSet::from_cookie_value("%5B%22COMPANY%22%5D"),
            expected
        );
    }

    #[test]
    fn malformed_cookies_degrade_to_no_roles() {
        let inputs = [
            "",
            "   ",
            "ADMIN",
            "{\"roles\":[\"ADMIN\"]}",
            "[\"ADMIN\"",
            "[1,2,3]",
            "[\"ADMIN\", 1]",
            "[\"ADMIN\", null]",
            "[\"admin\"]",
            "%E0%A4%A",
            "%5B%22ADMIN",
            "[[\"ADMIN\"]]",
            "\u{0}\u{1}",
        ];
        for input in inputs {
            assert!(
                RoleSet::from_cookie_value(input).is_empty(),
                "expected no roles for {input:?}"
            );
        }
    }

    #[test]
    fn oversized_cookie_is_rejected() {
        let huge = format!("[{}\"ADMIN\"]", "\"USER\",".repeat(1000));
        assert!(RoleSet::from_cookie_value(&huge).is_empty());
    }

    #[test]
    fn missing_cookie_means_no_roles() {
        assert!(RoleSet::from_optional_cookie(None).is_empty());
    }

    #[test]
    fn set_operations() {
        let roles = set(&[RoleTag::JoinedUser]);
        assert!(roles.has_member_role());
        assert!(roles.intersects(&set(&[RoleTag::User, RoleTag::JoinedUser])));
        assert!(!roles.intersects(&set(&[RoleTag::Admin])));
        assert!(!set(&[RoleTag::Company]).has_member_role());
    }

    #[test]
    fn serde_uses_plain_string_arrays() {
        let roles: RoleSet = serde_json::from_str(r#"["USER","ADMIN"]"#).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["ADMIN","USER"]"#);
        assert!(serde_json::from_str::<RoleSet>(r#"["user"]"#).is_err());
    }
}
