//! Auth collaborators: refresh, logout and identity lookup.
//!
//! The refresh credential lives in an HTTP-only cookie owned by the API; this
//! code never reads it. A refresh either yields a new bearer token or fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use hireline_core::Identity;
use hireline_http::{ApiError, ErrorKind, HttpGateway, RequestOptions, TokenSource};

use crate::SessionEndpoints;

/// The server-side auth operations the session depends on.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Mint a new bearer token from the refresh credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh credential is missing or expired, or
    /// the call fails.
    async fn refresh(&self) -> Result<String, ApiError>;

    /// Invalidate the server-side session for the current refresh credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn logout(&self) -> Result<(), ApiError>;

    /// Look up the identity that owns `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the call fails.
    async fn current_identity(&self, token: &str) -> Result<Identity, ApiError>;
}

/// Token payload returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token", alias = "token")]
    access_token: String,
}

/// Auth client that talks to the marketplace API through the gateway.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    gateway: HttpGateway,
    endpoints: SessionEndpoints,
}

impl HttpAuthClient {
    /// Create a client over a gateway.
    #[must_use]
    pub const fn new(gateway: HttpGateway, endpoints: SessionEndpoints) -> Self {
        Self { gateway, endpoints }
    }
}

/// Token source pinned to one token, used before the store holds it.
struct FixedToken(String);

impl TokenSource for FixedToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn refresh(&self) -> Result<String, ApiError> {
        let response: RefreshResponse = self
            .gateway
            .request_as(&self.endpoints.refresh, RequestOptions::post())
            .await?;

        if response.access_token.is_empty() {
            return Err(ApiError::new(
                ErrorKind::UnknownError,
                "refresh returned an empty token",
            ));
        }
        Ok(response.access_token)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.gateway
            .request(&self.endpoints.logout, RequestOptions::post())
            .await?;
        Ok(())
    }

    async fn current_identity(&self, token: &str) -> Result<Identity, ApiError> {
        let gateway = self
            .gateway
            .with_token_source(Arc::new(FixedToken(token.to_string())));
        gateway
            .request_as(&self.endpoints.identity, RequestOptions::get())
            .await
    }
}

/// A scripted auth client for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use hireline_core::Identity;
    use hireline_http::{ApiError, ErrorKind};

    use super::AuthClient;

    /// Auth client whose answers are queued up front.
    ///
    /// An empty refresh queue answers `UNAUTHORIZED`; an empty identity
    /// answer answers `NOT_FOUND`.
    #[derive(Debug, Default)]
    pub struct MockAuthClient {
        refreshes: Mutex<VecDeque<Result<String, ApiError>>>,
        identity: Mutex<Option<Identity>>,
        logout_error: Mutex<Option<ApiError>>,
        delay: Option<Duration>,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    impl MockAuthClient {
        /// Create a client with nothing queued.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every refresh by `delay`.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Queue a successful refresh.
        #[must_use]
        pub fn refresh_ok(self, token: &str) -> Self {
            self.refreshes.lock().push_back(Ok(token.to_string()));
            self
        }

        /// Queue a failed refresh.
        #[must_use]
        pub fn refresh_err(self, kind: ErrorKind) -> Self {
            self.refreshes
                .lock()
                .push_back(Err(ApiError::new(kind, "refresh failed")));
            self
        }

        /// Answer identity lookups with `identity`.
        #[must_use]
        pub fn identity(self, identity: Identity) -> Self {
            *self.identity.lock() = Some(identity);
            self
        }

        /// Make logout fail with `kind`.
        #[must_use]
        pub fn logout_err(self, kind: ErrorKind) -> Self {
            *self.logout_error.lock() = Some(ApiError::new(kind, "logout failed"));
            self
        }

        /// Number of refresh calls made so far.
        #[must_use]
        pub fn refresh_calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }

        /// Number of logout calls made so far.
        #[must_use]
        pub fn logout_calls(&self) -> usize {
            self.logout_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthClient for MockAuthClient {
        async fn refresh(&self) -> Result<String, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.refreshes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new(ErrorKind::Unauthorized, "no refresh token")))
        }

        async fn logout(&self) -> Result<(), ApiError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            match self.logout_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn current_identity(&self, _token: &str) -> Result<Identity, ApiError> {
            self.identity
                .lock()
                .clone()
                .ok_or_else(|| ApiError::new(ErrorKind::NotFound, "no identity"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireline_core::RoleTag;
    use hireline_http::{ClientConfig, NoToken};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpAuthClient {
        let gateway =
            HttpGateway::new(ClientConfig::with_base_url(server.uri()), Arc::new(NoToken)).unwrap();
        HttpAuthClient::new(gateway, SessionEndpoints::default())
    }

    #[tokio::test]
    async fn refresh_returns_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).refresh().await.unwrap();
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn refresh_accepts_snake_case_token() {
        let server = MockServer::start().await;
        Mock::given(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t2"})))
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).refresh().await.unwrap(), "t2");
    }

    #[tokio::test]
    async fn refresh_rejects_empty_token() {
        let server = MockServer::start().await;
        Mock::given(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": ""})))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownError);
    }

    #[tokio::test]
    async fn expired_refresh_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "refresh expired"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).refresh().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, "refresh expired");
    }

    #[tokio::test]
    async fn logout_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).logout().await.unwrap();
    }

    #[tokio::test]
    async fn identity_lookup_uses_the_given_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer login-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "email": "hr@example.com",
                "roles": ["COMPANY"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client_for(&server)
            .current_identity("login-token")
            .await
            .unwrap();
        assert_eq!(identity.id.as_str(), "3");
        assert!(identity.roles.contains(&RoleTag::Company));
    }
}
