//! Core types for the hireline session plane.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: the opaque [`UserId`] issued by the marketplace API
//! - **Roles**: [`RoleTag`] and the ordered, deduplicated [`RoleSet`], including
//!   the fail-closed codec for the `user-roles` cookie
//! - **Identity**: the persisted [`Identity`] of the signed-in account
//!
//! # Example
//!
//! ```
//! use hireline_core::{RoleSet, RoleTag};
//!
//! // Parsing the role cookie never fails; garbage yields zero roles.
//! let roles = RoleSet::from_cookie_value(r#"["ADMIN","USER"]"#);
//! assert!(roles.contains(&RoleTag::Admin));
//!
//! let roles = RoleSet::from_cookie_value("not json");
//! assert!(roles.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod identity;
pub mod ids;
pub mod roles;

pub use error::{CoreError, Result};
pub use identity::Identity;
pub use ids::UserId;
pub use roles::{RoleSet, RoleTag, ROLE_COOKIE_NAME};
