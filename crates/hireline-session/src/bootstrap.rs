//! Silent session recovery at process start.
//!
//! The bootstrapper runs once per process. It reconciles the persisted
//! identity with a fresh bearer token from the refresh collaborator, or
//! settles into guest state. A missing or expired session is normal; nothing
//! on this path is reported as an error.

use std::sync::Arc;

use tokio::sync::OnceCell;

use hireline_core::RoleSet;

use crate::auth_client::AuthClient;
use crate::credentials::CredentialStore;
use crate::role_cookie::RoleCookieSync;

/// Outcome of bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Token and identity are both present.
    Authenticated,
    /// No usable session.
    Guest,
}

/// Write the role cookie and adopt the roles the edge actually wrote.
///
/// The edge writes what the API confirms, so a stale persisted identity is
/// corrected to match the cookie. Write failures are logged only.
pub(crate) async fn write_confirmed_roles(
    store: &CredentialStore,
    cookies: &dyn RoleCookieSync,
    roles: &RoleSet,
) {
    match cookies.write(roles).await {
        Ok(written) if written != *roles => {
            tracing::info!(
                stored = %roles.to_cookie_value(),
                confirmed = %written.to_cookie_value(),
                "Stored roles were stale, adopting confirmed roles"
            );
            store.update_roles(written);
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "Failed to write role cookie"),
    }
}

/// Runs session recovery exactly once.
pub struct SessionBootstrapper<A>
where
    A: AuthClient,
{
    store: Arc<CredentialStore>,
    auth: Arc<A>,
    cookies: Arc<dyn RoleCookieSync>,
    initialized: OnceCell<SessionState>,
}

impl<A> SessionBootstrapper<A>
where
    A: AuthClient,
{
    /// Create a bootstrapper.
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, auth: Arc<A>, cookies: Arc<dyn RoleCookieSync>) -> Self {
        Self {
            store,
            auth,
            cookies,
            initialized: OnceCell::new(),
        }
    }

    /// Returns `true` once bootstrapping has finished.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// The bootstrapped state, or `None` while bootstrapping has not finished.
    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        self.initialized.get().copied()
    }

    /// Run recovery, or return the result of the run that already happened.
    ///
    /// Concurrent callers share a single run; only one refresh round-trip is
    /// ever made.
    pub async fn run(&self) -> SessionState {
        *self.initialized.get_or_init(|| self.bootstrap()).await
    }

    async fn bootstrap(&self) -> SessionState {
        let Some(identity) = self.store.identity() else {
            tracing::debug!("No persisted identity, starting as guest");
            self.clear_cookie().await;
            return SessionState::Guest;
        };

        if self.store.access_token().is_some() {
            tracing::debug!(user_id = %identity.id, "Session already established in this process");
            self.write_cookie(&identity.roles).await;
            return SessionState::Authenticated;
        }

        match self.auth.refresh().await {
            Ok(token) => {
                tracing::info!(user_id = %identity.id, "Session recovered");
                let roles = identity.roles.clone();
                self.store.set_auth(token, identity);
                self.write_cookie(&roles).await;
                SessionState::Authenticated
            }
            Err(err) => {
                tracing::info!(
                    user_id = %identity.id,
                    kind = %err.kind,
                    "Session could not be recovered, continuing as guest"
                );
                self.store.clear_auth();
                self.clear_cookie().await;
                SessionState::Guest
            }
        }
    }

    async fn write_cookie(&self, roles: &RoleSet) {
        write_confirmed_roles(&self.store, self.cookies.as_ref(), roles).await;
    }

    async fn clear_cookie(&self) {
        if let Err(err) = self.cookies.clear().await {
            tracing::warn!(error = %err, "Failed to clear role cookie");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hireline_core::{Identity, RoleTag, UserId};
    use hireline_http::ErrorKind;

    use crate::auth_client::mock::MockAuthClient;
    use crate::credentials::MemoryIdentityStore;
    use crate::role_cookie::recording::{CookieOp, RecordingRoleCookieSync};

    fn identity() -> Identity {
        Identity::new(
            UserId::parse("9").unwrap(),
            "talent@example.com",
            [RoleTag::User].into_iter().collect(),
        )
    }

    fn restarted_store() -> Arc<CredentialStore> {
        Arc::new(CredentialStore::open(Arc::new(
            MemoryIdentityStore::with_identity(identity()),
        )))
    }

    fn roles() -> RoleSet {
        identity().roles
    }

    #[tokio::test]
    async fn guest_without_persisted_identity() {
        let store = Arc::new(CredentialStore::in_memory());
        let auth = Arc::new(MockAuthClient::new().refresh_ok("unused"));
        let cookies = Arc::new(RecordingRoleCookieSync::new());
        let boot = SessionBootstrapper::new(Arc::clone(&store), Arc::clone(&auth), cookies.clone());

        assert!(!boot.is_initialized());
        assert_eq!(boot.run().await, SessionState::Guest);
        assert!(boot.is_initialized());
        assert_eq!(auth.refresh_calls(), 0);
        assert_eq!(cookies.ops(), vec![CookieOp::Clear]);
    }

    #[tokio::test]
    async fn recovers_with_refreshed_token() {
        let store = restarted_store();
        let auth = Arc::new(MockAuthClient::new().refresh_ok("fresh"));
        let cookies = Arc::new(RecordingRoleCookieSync::new());
        let boot = SessionBootstrapper::new(Arc::clone(&store), Arc::clone(&auth), cookies.clone());

        assert_eq!(boot.run().await, SessionState::Authenticated);
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().unwrap().as_str(), "fresh");
        assert_eq!(cookies.current(), Some(roles()));
    }

    #[tokio::test]
    async fn failed_refresh_clears_everything() {
        for kind in [ErrorKind::Unauthorized, ErrorKind::NetworkError, ErrorKind::Timeout] {
            let store = restarted_store();
            let auth = Arc::new(MockAuthClient::new().refresh_err(kind));
            let cookies = Arc::new(RecordingRoleCookieSync::new());
            let boot = SessionBootstrapper::new(Arc::clone(&store), auth, cookies.clone());

            assert_eq!(boot.run().await, SessionState::Guest);
            assert!(!store.is_authenticated());
            assert!(store.identity().is_none(), "half-state left behind for {kind}");
            assert_eq!(cookies.ops(), vec![CookieOp::Clear]);
        }
    }

    #[tokio::test]
    async fn same_process_login_skips_refresh() {
        let store = Arc::new(CredentialStore::in_memory());
        store.set_auth("login-token", identity());
        let auth = Arc::new(MockAuthClient::new());
        let cookies = Arc::new(RecordingRoleCookieSync::new());
        let boot = SessionBootstrapper::new(Arc::clone(&store), Arc::clone(&auth), cookies.clone());

        assert_eq!(boot.run().await, SessionState::Authenticated);
        assert_eq!(auth.refresh_calls(), 0);
        assert_eq!(cookies.ops(), vec![CookieOp::Write(roles())]);
    }

    #[tokio::test]
    async fn stale_identity_adopts_confirmed_roles() {
        let company: RoleSet = [RoleTag::Company].into_iter().collect();
        let store = restarted_store();
        let auth = Arc::new(MockAuthClient::new().refresh_ok("fresh"));
        let cookies = Arc::new(RecordingRoleCookieSync::confirming(company.clone()));
        let boot = SessionBootstrapper::new(Arc::clone(&store), auth, cookies.clone());

        assert_eq!(boot.run().await, SessionState::Authenticated);
        assert_eq!(cookies.current(), Some(company.clone()));
        assert_eq!(store.roles(), company);
        assert_eq!(store.identity().unwrap().roles, company);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store = restarted_store();
        let auth = Arc::new(MockAuthClient::new().refresh_ok("fresh"));
        let cookies = Arc::new(RecordingRoleCookieSync::new());
        let boot = SessionBootstrapper::new(store, Arc::clone(&auth), cookies.clone());

        boot.run().await;
        boot.run().await;

        assert_eq!(auth.refresh_calls(), 1);
        assert_eq!(cookies.ops().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_round_trip() {
        let store = restarted_store();
        let auth = Arc::new(
            MockAuthClient::new()
                .refresh_ok("fresh")
                .with_delay(Duration::from_millis(50)),
        );
        let cookies = Arc::new(RecordingRoleCookieSync::new());
        let boot = Arc::new(SessionBootstrapper::new(
            store,
            Arc::clone(&auth),
            cookies,
        ));

        let runs = (0..8).map(|_| {
            let boot = Arc::clone(&boot);
            tokio::spawn(async move { boot.run().await })
        });
        let states = futures::future::join_all(runs).await;

        assert!(states
            .into_iter()
            .all(|s| s.unwrap() == SessionState::Authenticated));
        assert_eq!(auth.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn cookie_failure_does_not_fail_bootstrap() {
        let store = restarted_store();
        let auth = Arc::new(MockAuthClient::new().refresh_ok("fresh"));
        let cookies = Arc::new(RecordingRoleCookieSync::failing());
        let boot = SessionBootstrapper::new(Arc::clone(&store), auth, cookies);

        assert_eq!(boot.run().await, SessionState::Authenticated);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn state_is_none_until_initialized() {
        let boot = SessionBootstrapper::new(
            Arc::new(CredentialStore::in_memory()),
            Arc::new(MockAuthClient::new()),
            Arc::new(RecordingRoleCookieSync::new()),
        );
        assert_eq!(boot.state(), None);
        boot.run().await;
        assert_eq!(boot.state(), Some(SessionState::Guest));
    }
}
