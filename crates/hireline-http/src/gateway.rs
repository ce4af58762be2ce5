//! The central outbound request function.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ErrorKind, Result};
use crate::ClientConfig;

/// Supplies the current bearer token, if any.
///
/// The gateway asks on every request, so a token replaced between calls is
/// picked up immediately.
pub trait TokenSource: Send + Sync {
    /// Return the bearer token to attach, or `None` to send the request
    /// without an `Authorization` header.
    fn bearer_token(&self) -> Option<String>;
}

/// A token source that never has a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenSource for NoToken {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Overrides the configured default timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options for the given method with no body.
    #[must_use]
    pub const fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            query: Vec::new(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    /// A `GET` request.
    #[must_use]
    pub const fn get() -> Self {
        Self::new(Method::GET)
    }

    /// A `POST` request.
    #[must_use]
    pub const fn post() -> Self {
        Self::new(Method::POST)
    }

    /// A `PUT` request.
    #[must_use]
    pub const fn put() -> Self {
        Self::new(Method::PUT)
    }

    /// A `PATCH` request.
    #[must_use]
    pub const fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    /// A `DELETE` request.
    #[must_use]
    pub const fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Override the timeout for this request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// Gateway for all outbound API calls.
#[derive(Clone)]
pub struct HttpGateway {
    config: ClientConfig,
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(config.cookie_store)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                ApiError::new(
                    ErrorKind::UnknownError,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self::with_client(client, config, tokens))
    }

    /// Create a gateway around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            config,
            client,
            tokens,
        }
    }

    /// Return a gateway sharing this one's HTTP client and configuration but
    /// reading tokens from a different source.
    #[must_use]
    pub fn with_token_source(&self, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            config: self.config.clone(),
            client: self.client.clone(),
            tokens,
        }
    }

    /// Get the gateway configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform a request and return the parsed JSON body.
    ///
    /// A `204 No Content` response, or any empty success body, resolves to
    /// an empty JSON object without attempting to parse.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`]:
    /// - `TIMEOUT` when the call outlives its timeout
    /// - `NETWORK_ERROR` when no response was received
    /// - a status-derived kind for non-2xx responses
    /// - `UNKNOWN_ERROR` when a success body is not JSON
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        let url = self.config.url_for(endpoint);
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.config.request_timeout());
        let method = options.method.clone();

        tracing::debug!(method = %method, endpoint, "Sending request");

        let builder = self.build(&url, options)?;
        let result = match tokio::time::timeout(timeout, Self::execute(builder)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(timeout.as_millis())),
        };

        match &result {
            Ok(_) => tracing::debug!(method = %method, endpoint, "Request succeeded"),
            Err(err) => match err.kind {
                ErrorKind::NetworkError | ErrorKind::Timeout | ErrorKind::ServerError => {
                    tracing::warn!(
                        method = %method,
                        endpoint,
                        kind = %err.kind,
                        status = ?err.status,
                        error = %err.message,
                        "Request failed"
                    );
                }
                _ => tracing::debug!(
                    method = %method,
                    endpoint,
                    kind = %err.kind,
                    status = ?err.status,
                    "Request rejected"
                ),
            },
        }

        result
    }

    /// Perform a request and decode the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`request`](Self::request), plus
    /// `UNKNOWN_ERROR` if the body does not decode into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self.request(endpoint, options).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                ErrorKind::UnknownError,
                format!("unexpected response shape: {e}"),
            )
        })
    }

    /// `GET` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, RequestOptions::get()).await
    }

    /// `POST` a JSON body to an endpoint.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request). Also fails with `UNKNOWN_ERROR` if the
    /// body cannot be serialized.
    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value> {
        let body = to_json(body)?;
        self.request(endpoint, RequestOptions::post().json(body))
            .await
    }

    /// `PUT` a JSON body to an endpoint.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value> {
        let body = to_json(body)?;
        self.request(endpoint, RequestOptions::put().json(body)).await
    }

    /// `PATCH` a JSON body to an endpoint.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn patch<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value> {
        let body = to_json(body)?;
        self.request(endpoint, RequestOptions::patch().json(body))
            .await
    }

    /// `DELETE` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    fn build(&self, url: &str, options: RequestOptions) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .client
            .request(options.method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.bearer_token().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ApiError::new(ErrorKind::UnknownError, "bearer token is not a valid header value")
            })?;
            builder = builder.header(AUTHORIZATION, value);
        }

        for (name, value) in options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ApiError::new(ErrorKind::BadRequest, format!("invalid header name: {name}"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|_| {
                ApiError::new(ErrorKind::BadRequest, format!("invalid value for header {name}"))
            })?;
            builder = builder.header(name, value);
        }

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        if let Some(body) = options.body {
            builder = builder.json(&body);
        }

        Ok(builder)
    }

    async fn execute(builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(empty_object());
        }

        if !status.is_success() {
            // An unreadable error body still yields a status-classified error.
            let body = response.bytes().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(empty_object());
        }

        serde_json::from_slice(&body).map_err(|e| ApiError {
            kind: ErrorKind::UnknownError,
            status: Some(status.as_u16()),
            message: format!("invalid response body: {e}"),
            code: None,
        })
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| {
        ApiError::new(
            ErrorKind::UnknownError,
            format!("failed to serialize request body: {e}"),
        )
    })
}

fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::new(ErrorKind::Timeout, err.to_string())
    } else {
        ApiError::network(err.to_string())
    }
}
