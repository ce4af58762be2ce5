//! Session lifecycle entry points: bootstrap, login, recovery and logout.

use std::sync::Arc;

use hireline_core::Identity;

use crate::auth_client::AuthClient;
use crate::bootstrap::{write_confirmed_roles, SessionBootstrapper, SessionState};
use crate::credentials::CredentialStore;
use crate::error::{Result, SessionError};
use crate::role_cookie::RoleCookieSync;

/// Owns the client-side session.
///
/// The manager is the only writer of the credential store besides the
/// bootstrapper it wraps; every write is followed by the matching role-cookie
/// write or clear.
pub struct SessionManager<A>
where
    A: AuthClient,
{
    store: Arc<CredentialStore>,
    auth: Arc<A>,
    cookies: Arc<dyn RoleCookieSync>,
    bootstrapper: SessionBootstrapper<A>,
}

impl<A> SessionManager<A>
where
    A: AuthClient,
{
    /// Create a session manager.
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, auth: Arc<A>, cookies: Arc<dyn RoleCookieSync>) -> Self {
        let bootstrapper =
            SessionBootstrapper::new(Arc::clone(&store), Arc::clone(&auth), Arc::clone(&cookies));
        Self {
            store,
            auth,
            cookies,
            bootstrapper,
        }
    }

    /// Get the credential store.
    #[must_use]
    pub const fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Run (or join) the one-time session recovery.
    pub async fn bootstrap(&self) -> SessionState {
        self.bootstrapper.run().await
    }

    /// Returns `true` once the one-time recovery has finished.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.bootstrapper.is_initialized()
    }

    /// The authentication state, or `None` until recovery has finished.
    ///
    /// Conditional network calls must wait for `Some`.
    #[must_use]
    pub fn session_state(&self) -> Option<SessionState> {
        if !self.bootstrapper.is_initialized() {
            return None;
        }
        Some(if self.store.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Guest
        })
    }

    /// Complete a login for which only the bearer token is known.
    ///
    /// The identity is looked up with that token before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity lookup fails; the store is left as it was.
    pub async fn login(&self, token: &str) -> Result<Identity> {
        let identity = self.auth.current_identity(token).await?;
        self.login_with_identity(token, identity.clone()).await;
        Ok(identity)
    }

    /// Complete a login whose response already carried the identity.
    pub async fn login_with_identity(&self, token: &str, identity: Identity) {
        let roles = identity.roles.clone();
        tracing::info!(user_id = %identity.id, "Signed in");
        self.store.set_auth(token, identity);
        write_confirmed_roles(&self.store, self.cookies.as_ref(), &roles).await;
    }

    /// Mint a new bearer token after a call was rejected as unauthorized.
    ///
    /// The gateway never retries; callers that want one more attempt call
    /// this and then repeat their request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionExpired`] if there is no identity to
    /// recover or the refresh fails. The session is fully cleared in that case.
    pub async fn recover(&self) -> Result<()> {
        let Some(identity) = self.store.identity() else {
            return Err(SessionError::SessionExpired);
        };

        match self.auth.refresh().await {
            Ok(token) => {
                self.store.update_access_token(token);
                tracing::debug!(user_id = %identity.id, "Access token renewed");
                Ok(())
            }
            Err(err) => {
                tracing::info!(kind = %err.kind, "Access token renewal failed, signing out");
                self.clear_local().await;
                Err(SessionError::SessionExpired)
            }
        }
    }

    /// Sign out.
    ///
    /// The server-side session is invalidated on a best-effort basis; local
    /// state is cleared whatever the outcome.
    pub async fn logout(&self) {
        if let Err(err) = self.auth.logout().await {
            tracing::warn!(error = %err, "Server logout failed, clearing local session anyway");
        }
        self.clear_local().await;
        tracing::info!("Signed out");
    }

    async fn clear_local(&self) {
        self.store.clear_auth();
        if let Err(err) = self.cookies.clear().await {
            tracing::warn!(error = %err, "Failed to clear role cookie");
        }
    }
}
