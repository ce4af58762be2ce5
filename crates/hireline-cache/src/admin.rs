//! Admin dashboard read-models and their toggle mutations.
//!
//! The admin dashboard lists users and companies page by page. Locking an
//! account and granting or revoking a role are applied optimistically across
//! every cached page through [`OptimisticCoordinator`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hireline_core::{RoleSet, RoleTag, UserId};
use hireline_http::{ApiError, HttpGateway, RequestOptions};

use crate::cache::{CacheEntry, QueryCache};
use crate::error::{MutationError, Result};
use crate::key::QueryKey;
use crate::optimistic::{OptimisticCoordinator, StateMutation};

/// Collection name of the admin user list.
pub const ADMIN_USERS: &str = "admin-users";

/// Collection name of the admin company list.
pub const ADMIN_COMPANIES: &str = "admin-companies";

/// A user as listed on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserRow {
    /// Account id.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Display name, if the user set one.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the account is locked.
    #[serde(default)]
    pub locked: bool,
    /// Roles granted to the account.
    #[serde(default)]
    pub roles: RoleSet,
}

impl CacheEntry for AdminUserRow {
    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

/// A company as listed on the admin dashboard.
///
/// Companies sign in like any other account, so they share the id space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCompanyRow {
    /// Account id of the company.
    pub id: UserId,
    /// Registered company name.
    pub name: String,
    /// Whether the company account is locked.
    #[serde(default)]
    pub locked: bool,
}

impl CacheEntry for AdminCompanyRow {
    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Desired lock state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// The account cannot sign in.
    Locked,
    /// The account can sign in.
    Unlocked,
}

impl LockState {
    /// Lock state from a flag.
    #[must_use]
    pub const fn from_locked(locked: bool) -> Self {
        if locked {
            Self::Locked
        } else {
            Self::Unlocked
        }
    }

    /// Returns `true` for [`LockState::Locked`].
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Path segment of the endpoint that moves an account into this state.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Locked => "lock",
            Self::Unlocked => "unlock",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// A role grant or revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChange {
    /// Add the role.
    Grant(RoleTag),
    /// Remove the role.
    Revoke(RoleTag),
}

impl RoleChange {
    /// The role being changed.
    #[must_use]
    pub const fn role(&self) -> &RoleTag {
        match self {
            Self::Grant(role) | Self::Revoke(role) => role,
        }
    }
}

impl fmt::Display for RoleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grant(role) => write!(f, "grant {}", role.as_str()),
            Self::Revoke(role) => write!(f, "revoke {}", role.as_str()),
        }
    }
}

fn account_path(kind: &str, id: &str, rest: &str) -> String {
    format!("/admin/{kind}/{}/{rest}", urlencoding::encode(id))
}

/// Locks and unlocks user accounts.
#[derive(Debug, Clone)]
pub struct UserLockMutation {
    gateway: HttpGateway,
}

impl UserLockMutation {
    /// Create the mutation over a gateway.
    #[must_use]
    pub const fn new(gateway: HttpGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StateMutation for UserLockMutation {
    type Entry = AdminUserRow;
    type State = LockState;

    fn collection(&self) -> &str {
        ADMIN_USERS
    }

    fn describe(&self, state: &LockState) -> String {
        state.to_string()
    }

    fn patch(&self, entry: &mut AdminUserRow, state: &LockState) {
        entry.locked = state.is_locked();
    }

    async fn commit(&self, target_id: &str, state: &LockState) -> std::result::Result<(), ApiError> {
        let endpoint = account_path("users", target_id, state.action());
        self.gateway
            .request(&endpoint, RequestOptions::post())
            .await?;
        Ok(())
    }
}

/// Locks and unlocks company accounts.
#[derive(Debug, Clone)]
pub struct CompanyLockMutation {
    gateway: HttpGateway,
}

impl CompanyLockMutation {
    /// Create the mutation over a gateway.
    #[must_use]
    pub const fn new(gateway: HttpGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StateMutation for CompanyLockMutation {
    type Entry = AdminCompanyRow;
    type State = LockState;

    fn collection(&self) -> &str {
        ADMIN_COMPANIES
    }

    fn describe(&self, state: &LockState) -> String {
        state.to_string()
    }

    fn patch(&self, entry: &mut AdminCompanyRow, state: &LockState) {
        entry.locked = state.is_locked();
    }

    async fn commit(&self, target_id: &str, state: &LockState) -> std::result::Result<(), ApiError> {
        let endpoint = account_path("companies", target_id, state.action());
        self.gateway
            .request(&endpoint, RequestOptions::post())
            .await?;
        Ok(())
    }
}

/// Grants and revokes user roles.
#[derive(Debug, Clone)]
pub struct RoleGrantMutation {
    gateway: HttpGateway,
}

impl RoleGrantMutation {
    /// Create the mutation over a gateway.
    #[must_use]
    pub const fn new(gateway: HttpGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StateMutation for RoleGrantMutation {
    type Entry = AdminUserRow;
    type State = RoleChange;

    fn collection(&self) -> &str {
        ADMIN_USERS
    }

    fn describe(&self, change: &RoleChange) -> String {
        change.to_string()
    }

    fn patch(&self, entry: &mut AdminUserRow, change: &RoleChange) {
        match change {
            RoleChange::Grant(role) => {
                entry.roles.insert(role.clone());
            }
            RoleChange::Revoke(role) => {
                entry.roles.remove(role);
            }
        }
    }

    async fn commit(
        &self,
        target_id: &str,
        change: &RoleChange,
    ) -> std::result::Result<(), ApiError> {
        let endpoint = account_path(
            "users",
            target_id,
            &format!("roles/{}", urlencoding::encode(change.role().as_str())),
        );
        let options = match change {
            RoleChange::Grant(_) => RequestOptions::post(),
            RoleChange::Revoke(_) => RequestOptions::delete(),
        };
        self.gateway.request(&endpoint, options).await?;
        Ok(())
    }
}

/// List payloads arrive either bare or wrapped in `items`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

/// Cached admin lists with their toggle mutations.
pub struct AdminDirectory {
    gateway: HttpGateway,
    users: Arc<QueryCache<AdminUserRow>>,
    companies: Arc<QueryCache<AdminCompanyRow>>,
    user_locks: OptimisticCoordinator<UserLockMutation>,
    company_locks: OptimisticCoordinator<CompanyLockMutation>,
    role_grants: OptimisticCoordinator<RoleGrantMutation>,
}

impl AdminDirectory {
    /// Create a directory over a gateway whose token source carries an admin
    /// bearer token.
    #[must_use]
    pub fn new(gateway: HttpGateway) -> Self {
        let users = Arc::new(QueryCache::new());
        let companies = Arc::new(QueryCache::new());
        Self {
            user_locks: OptimisticCoordinator::new(
                Arc::clone(&users),
                UserLockMutation::new(gateway.clone()),
            ),
            company_locks: OptimisticCoordinator::new(
                Arc::clone(&companies),
                CompanyLockMutation::new(gateway.clone()),
            ),
            role_grants: OptimisticCoordinator::new(
                Arc::clone(&users),
                RoleGrantMutation::new(gateway.clone()),
            ),
            gateway,
            users,
            companies,
        }
    }

    /// The cached user views.
    #[must_use]
    pub const fn users(&self) -> &Arc<QueryCache<AdminUserRow>> {
        &self.users
    }

    /// The cached company views.
    #[must_use]
    pub const fn companies(&self) -> &Arc<QueryCache<AdminCompanyRow>> {
        &self.companies
    }

    /// Key of one page of the user list.
    #[must_use]
    pub fn users_key(page: u32, search: Option<&str>) -> QueryKey {
        let key = QueryKey::new(ADMIN_USERS).param("page", page);
        match search {
            Some(search) if !search.is_empty() => key.param("search", search),
            _ => key,
        }
    }

    /// Key of one page of the company list.
    #[must_use]
    pub fn companies_key(page: u32) -> QueryKey {
        QueryKey::new(ADMIN_COMPANIES).param("page", page)
    }

    /// Load one page of users and cache it.
    ///
    /// # Errors
    ///
    /// Returns the gateway error, or `Cancelled` if a toggle cancelled the load.
    pub async fn load_users(&self, page: u32, search: Option<&str>) -> Result<Vec<AdminUserRow>> {
        let key = Self::users_key(page, search);
        let options = query_options(&key);
        self.users
            .fetch(key, || self.list::<AdminUserRow>("/admin/users", options))
            .await
    }

    /// Load one page of companies and cache it.
    ///
    /// # Errors
    ///
    /// Returns the gateway error, or `Cancelled` if a toggle cancelled the load.
    pub async fn load_companies(&self, page: u32) -> Result<Vec<AdminCompanyRow>> {
        let key = Self::companies_key(page);
        let options = query_options(&key);
        self.companies
            .fetch(key, || self.list::<AdminCompanyRow>("/admin/companies", options))
            .await
    }

    async fn list<T>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> std::result::Result<Vec<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response: ListResponse<T> = self.gateway.request_as(endpoint, options).await?;
        Ok(response.into_items())
    }

    /// Lock or unlock a user.
    ///
    /// # Errors
    ///
    /// Returns a [`MutationError`] after rolling back if the server refuses.
    pub async fn set_user_lock(
        &self,
        id: &UserId,
        state: LockState,
    ) -> std::result::Result<(), MutationError> {
        self.user_locks.apply(id.as_str(), state).await
    }

    /// Lock or unlock a company.
    ///
    /// # Errors
    ///
    /// Returns a [`MutationError`] after rolling back if the server refuses.
    pub async fn set_company_lock(
        &self,
        id: &UserId,
        state: LockState,
    ) -> std::result::Result<(), MutationError> {
        self.company_locks.apply(id.as_str(), state).await
    }

    /// Grant or revoke a user role.
    ///
    /// # Errors
    ///
    /// Returns a [`MutationError`] after rolling back if the server refuses.
    pub async fn change_role(
        &self,
        id: &UserId,
        change: RoleChange,
    ) -> std::result::Result<(), MutationError> {
        self.role_grants.apply(id.as_str(), change).await
    }
}

impl fmt::Debug for AdminDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminDirectory")
            .field("users", &self.users)
            .field("companies", &self.companies)
            .finish_non_exhaustive()
    }
}

fn query_options(key: &QueryKey) -> RequestOptions {
    key.params()
        .iter()
        .fold(RequestOptions::get(), |options, (name, value)| {
            options.query(name.as_str(), value.as_str())
        })
}
