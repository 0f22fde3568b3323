//! HTTP authenticator
//!
//! Performs the credential exchange as a JSON POST against the authentication
//! endpoint and reads the issued signature from the response body.

use async_trait::async_trait;
use faye_auth_core::{
    config_error, AuthError, AuthRequest, Authenticator, Credential, FayeAuthResult,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Configuration for [`HttpAuthenticator`]
#[derive(Debug, Clone)]
pub struct HttpAuthenticatorConfig {
    /// Base URL relative endpoints are resolved against
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for HttpAuthenticatorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: 30,
            user_agent: "faye-auth/0.1".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl HttpAuthenticatorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    signature: Option<String>,
    token: Option<String>,
    error: Option<String>,
}

/// [`Authenticator`] backed by `reqwest`
pub struct HttpAuthenticator {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpAuthenticator {
    pub fn new(config: HttpAuthenticatorConfig) -> FayeAuthResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            config_error!(
                format!("Invalid base URL '{}': {}", config.base_url, e),
                "http_authenticator",
                e
            )
            .with_operation("create_client")
            .with_suggestion("Use an absolute URL such as https://example.com")
        })?;

        let client = create_http_client(&config)?;

        info!("Created HTTP authenticator for {}", base_url);

        Ok(Self {
            client,
            base_url,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    /// Resolve `endpoint` against the base URL unless it is already absolute
    fn endpoint_url(&self, endpoint: &str) -> Result<Url, AuthError> {
        if let Ok(url) = Url::parse(endpoint) {
            return Ok(url);
        }

        self.base_url
            .join(endpoint)
            .map_err(|e| AuthError::InvalidResponse {
                message: format!("Cannot resolve endpoint '{}': {}", endpoint, e),
            })
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(
        &self,
        endpoint: &str,
        request: &AuthRequest,
    ) -> Result<Credential, AuthError> {
        let url = self.endpoint_url(endpoint)?;

        debug!("Requesting authentication from: {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Timeout {
                        duration_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AuthError::network(format!("Failed to reach {}: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::rejected(
                status.as_u16(),
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                } else {
                    body
                },
            ));
        }

        let body: AuthResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse {
                    message: format!("Malformed authentication response: {}", e),
                })?;

        if let Some(error) = body.error {
            return Err(AuthError::rejected(status.as_u16(), error));
        }

        body.signature
            .or(body.token)
            .map(Credential::new)
            .ok_or_else(|| AuthError::InvalidResponse {
                message: "Response carries neither signature nor token".to_string(),
            })
    }
}

fn create_http_client(config: &HttpAuthenticatorConfig) -> FayeAuthResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            config_error!(format!("Invalid user agent: {}", e), "http_client", e)
                .with_operation("create_client")
        })?,
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            config_error!(format!("Invalid header name '{}': {}", key, e), "http_client", e)
                .with_operation("create_client")
        })?;

        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            config_error!(
                format!("Invalid header value for '{}': {}", key, e),
                "http_client",
                e
            )
            .with_operation("create_client")
        })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| {
            config_error!(format!("Failed to create HTTP client: {}", e), "http_client", e)
                .with_operation("create_client")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use faye_auth_core::FayeAuthError;

    fn authenticator(base_url: &str) -> HttpAuthenticator {
        HttpAuthenticator::new(HttpAuthenticatorConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_relative_endpoint_joins_base() {
        let auth = authenticator("http://localhost:9292");
        assert_eq!(
            auth.endpoint_url("/faye/auth").unwrap().as_str(),
            "http://localhost:9292/faye/auth"
        );
    }

    #[test]
    fn test_absolute_endpoint_is_kept() {
        let auth = authenticator("http://localhost:9292");
        assert_eq!(
            auth.endpoint_url("https://auth.example.com/sign").unwrap().as_str(),
            "https://auth.example.com/sign"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = match HttpAuthenticator::new(HttpAuthenticatorConfig::new("not a url")) {
            Err(err) => err,
            Ok(_) => panic!("relative base URL must be rejected"),
        };
        assert!(matches!(err, FayeAuthError::Config { .. }));
        assert_eq!(err.context().component, "http_authenticator");
        assert_eq!(err.context().operation.as_deref(), Some("create_client"));
    }

    #[test]
    fn test_invalid_header_name() {
        let config =
            HttpAuthenticatorConfig::new("http://localhost").with_header("bad header", "x");
        match HttpAuthenticator::new(config) {
            Err(FayeAuthError::Config { message, context, .. }) => {
                assert!(message.starts_with("Invalid header name 'bad header'"));
                assert_eq!(context.component, "http_client");
            }
            _ => panic!("invalid header name must be a Config error"),
        }
    }
}
