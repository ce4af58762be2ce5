//! Edge configuration types.

use std::time::Duration;

use axum_extra::extract::cookie::Key;
use serde::Deserialize;

use crate::error::{EdgeError, Result};

/// Configuration for the edge service.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Listen address (e.g., "0.0.0.0:3000").
    #[serde(default = "EdgeConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the marketplace API.
    #[serde(default = "EdgeConfig::default_api_base_url")]
    pub api_base_url: String,

    /// Identity endpoint on the API used to confirm roles.
    #[serde(default = "EdgeConfig::default_identity_endpoint")]
    pub identity_endpoint: String,

    /// Mark the role cookie `Secure`.
    #[serde(default = "EdgeConfig::default_cookie_secure")]
    pub cookie_secure: bool,

    /// Role cookie lifetime in seconds.
    #[serde(default = "EdgeConfig::default_cookie_max_age")]
    pub role_cookie_max_age_seconds: u64,

    /// Secret the role cookie is signed with; at least 64 bytes.
    ///
    /// Without one a random key is generated, and role cookies do not
    /// survive a restart.
    #[serde(default)]
    pub cookie_secret: Option<String>,

    /// Allowed CORS origins. Empty denies cross-origin requests; `*` allows
    /// any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "EdgeConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "EdgeConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl EdgeConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:3000".to_string()
    }

    fn default_api_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    fn default_identity_endpoint() -> String {
        "/auth/me".to_string()
    }

    const fn default_cookie_secure() -> bool {
        true
    }

    const fn default_cookie_max_age() -> u64 {
        60 * 60 * 24 * 7
    }

    const fn default_max_body() -> usize {
        64 * 1024
    }

    const fn default_request_timeout() -> u64 {
        15
    }

    /// Load configuration from the environment.
    ///
    /// Unset variables keep their defaults; unparseable values are logged
    /// and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(url) = lookup("API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(secret) = lookup("COOKIE_SECRET").filter(|s| !s.is_empty()) {
            config.cookie_secret = Some(secret);
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        parse_into(&lookup, "COOKIE_SECURE", &mut config.cookie_secure);
        parse_into(
            &lookup,
            "ROLE_COOKIE_MAX_AGE_SECONDS",
            &mut config.role_cookie_max_age_seconds,
        );
        parse_into(
            &lookup,
            "REQUEST_TIMEOUT_SECONDS",
            &mut config.request_timeout_seconds,
        );
        config
    }

    /// Key that signs the role cookie.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidConfig`] if the configured secret is
    /// shorter than 64 bytes, or if no secret is set and no random key can be
    /// generated.
    pub fn cookie_key(&self) -> Result<Key> {
        match &self.cookie_secret {
            Some(secret) => Key::try_from(secret.as_bytes())
                .map_err(|e| EdgeError::InvalidConfig(format!("COOKIE_SECRET: {e}"))),
            None => {
                tracing::warn!("No COOKIE_SECRET set, role cookies will not survive a restart");
                Key::try_generate().ok_or_else(|| {
                    EdgeError::InvalidConfig("could not generate a cookie key".to_string())
                })
            }
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_into<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(variable = name, value = %raw, "Ignoring unparseable setting"),
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            api_base_url: Self::default_api_base_url(),
            identity_endpoint: Self::default_identity_endpoint(),
            cookie_secure: Self::default_cookie_secure(),
            role_cookie_max_age_seconds: Self::default_cookie_max_age(),
            cookie_secret: None,
            cors_origins: Vec::new(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = EdgeConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert!(config.cookie_secure);
        assert_eq!(config.role_cookie_max_age_seconds, 604_800);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn default_and_deserialized_agree() {
        let parsed: EdgeConfig = serde_json::from_str("{}").unwrap();
        let default = EdgeConfig::default();
        assert_eq!(parsed.cors_origins, default.cors_origins);
        assert_eq!(parsed.cookie_secret, default.cookie_secret);
        assert_eq!(parsed.listen_addr, default.listen_addr);
    }

    #[test]
    fn cookie_key_needs_a_long_secret() {
        let short = EdgeConfig {
            cookie_secret: Some("too-short".to_string()),
            ..EdgeConfig::default()
        };
        assert!(matches!(short.cookie_key(), Err(EdgeError::InvalidConfig(_))));

        let long = EdgeConfig {
            cookie_secret: Some("k".repeat(64)),
            ..EdgeConfig::default()
        };
        assert!(long.cookie_key().is_ok());
        assert!(EdgeConfig::default().cookie_key().is_ok());
    }

    #[test]
    fn reads_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_BASE_URL", "http://api:8000"),
            ("COOKIE_SECURE", "false"),
            ("ROLE_COOKIE_MAX_AGE_SECONDS", "3600"),
            ("REQUEST_TIMEOUT_SECONDS", "soon"),
            ("CORS_ORIGINS", "https://hireline.dev, https://admin.hireline.dev"),
            ("COOKIE_SECRET", "s3cret"),
        ]
        .into_iter()
        .collect();

        let config = EdgeConfig::from_lookup(|name| env.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.api_base_url, "http://api:8000");
        assert!(!config.cookie_secure);
        assert_eq!(config.role_cookie_max_age_seconds, 3600);
        assert_eq!(config.request_timeout_seconds, 15);
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.cookie_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: EdgeConfig =
            serde_json::from_str(r#"{"listen_addr":"127.0.0.1:4000"}"#).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(config.identity_endpoint, "/auth/me");
        assert!(config.cors_origins.is_empty());
    }
}
