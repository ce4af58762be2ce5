//! Cached read-models with optimistic mutations.
//!
//! List views are cached per [`QueryKey`]; every page or filter of one
//! logical collection is its own key. Toggle mutations (lock, unlock, role
//! grants) patch every cached view of their collection before the server
//! answers and roll all of them back if it refuses.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hireline_cache::{AdminDirectory, LockState};
//! use hireline_core::UserId;
//! use hireline_http::{ClientConfig, HttpGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new(
//!     ClientConfig::default(),
//!     Arc::new(|| Some("admin-token".to_string())),
//! )?;
//! let directory = AdminDirectory::new(gateway);
//!
//! directory.load_users(1, None).await?;
//! if let Err(err) = directory.set_user_lock(&UserId::parse("42")?, LockState::Locked).await {
//!     eprintln!("could not lock user: {err}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admin;
pub mod cache;
pub mod error;
pub mod key;
pub mod optimistic;

pub use admin::{
    AdminCompanyRow, AdminDirectory, AdminUserRow, CompanyLockMutation, LockState, RoleChange,
    RoleGrantMutation, UserLockMutation, ADMIN_COMPANIES, ADMIN_USERS,
};
pub use cache::{CacheEntry, CachedView, CollectionSnapshot, QueryCache};
pub use error::{CacheError, MutationError, Result};
pub use key::QueryKey;
pub use optimistic::{OptimisticCoordinator, StateMutation};
