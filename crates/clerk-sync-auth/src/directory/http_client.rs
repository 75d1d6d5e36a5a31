//! HTTP client for the provider's backend API
//!
//! # Security Considerations
//!
//! - HTTPS required for the base URL (plain HTTP only for loopback hosts)
//! - Redirects are not followed, so the bearer credential never leaves the host
//! - The credential is held as a [`SecretString`] and never logged

use super::RemoteDirectory;
use crate::metrics::record_user_fetch;
use async_trait::async_trait;
use clerk_sync_types::{ConfigurationError, DirectoryError, KeySet, UserRecord};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default base URL of the provider's backend API
pub const DEFAULT_API_BASE_URL: &str = "https://api.clerk.com/v1";

/// Connection settings for [`HttpDirectoryClient`]
#[derive(Clone)]
pub struct DirectoryConfig {
    /// API base URL; resource paths are appended to it
    pub base_url: String,
    /// Backend secret key sent as the bearer credential
    pub secret_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl DirectoryConfig {
    /// Settings for the default API endpoint with a 10 second timeout
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            secret_key,
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// [`RemoteDirectory`] backed by the provider's REST API
///
/// # Example
///
/// ```rust,no_run
/// # use clerk_sync_auth::directory::{DirectoryConfig, HttpDirectoryClient, RemoteDirectory};
/// # use secrecy::SecretString;
/// # tokio_test::block_on(async {
/// let config = DirectoryConfig::new(SecretString::new("sk_test_123".to_string()));
/// let client = HttpDirectoryClient::new(config)?;
///
/// let keys = client.fetch_key_set().await?;
/// println!("provider publishes {} keys", keys.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct HttpDirectoryClient {
    base_url: Url,
    secret_key: SecretString,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for HttpDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirectoryClient")
            .field("base_url", &self.base_url.as_str())
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpDirectoryClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::MissingCredential`] if the secret key is blank
    /// - [`ConfigurationError::InvalidBaseUrl`] if the base URL does not parse,
    ///   cannot carry path segments, or is plain HTTP to a non-loopback host
    pub fn new(config: DirectoryConfig) -> Result<Self, ConfigurationError> {
        if config.secret_key.expose_secret().trim().is_empty() {
            return Err(ConfigurationError::MissingCredential);
        }

        let base_url = parse_base_url(&config.base_url)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: format!("HTTP client could not be built: {e}"),
            })?;

        Ok(Self {
            base_url,
            secret_key: config.secret_key,
            http_client,
        })
    }

    /// The API base URL
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // parse_base_url rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<(StatusCode, Option<T>), DirectoryError> {
        debug!(url = %url, "Directory request");

        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Directory request failed");
                DirectoryError::Transport {
                    status: e.status().map(|s| s.as_u16()),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok((status, None));
        }

        let body = response.bytes().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to read directory response");
            DirectoryError::transport(format!("failed to read response body: {e}"))
        })?;

        let value = serde_json::from_slice(&body).map_err(|e| {
            error!(url = %url, error = %e, "Failed to decode directory response");
            DirectoryError::MalformedResponse {
                message: e.to_string(),
            }
        })?;

        Ok((status, Some(value)))
    }
}

fn status_error(status: StatusCode) -> DirectoryError {
    DirectoryError::Transport {
        status: Some(status.as_u16()),
        message: format!("directory returned status {status}"),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path"));
    }

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        "http" => Err(invalid("HTTPS is required (HTTP only allowed for loopback)")),
        _ => Err(invalid("unsupported scheme")),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

#[async_trait]
impl RemoteDirectory for HttpDirectoryClient {
    async fn fetch_key_set(&self) -> Result<KeySet, DirectoryError> {
        let url = self.endpoint(&["jwks"]);
        info!(url = %url, "Fetching signing keys from directory");

        match self.get_json::<KeySet>(url).await? {
            (_, Some(keys)) => {
                info!(key_count = keys.len(), "Fetched signing keys");
                Ok(keys)
            }
            (status, None) => {
                error!(status = %status, "Key set endpoint returned error status");
                Err(status_error(status))
            }
        }
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, DirectoryError> {
        let url = self.endpoint(&["users", user_id]);

        let result = match self.get_json::<UserRecord>(url).await {
            Ok((_, Some(user))) => Ok(user),
            Ok((StatusCode::NOT_FOUND, None)) => {
                warn!(user_id = %user_id, "User not found in directory");
                Err(DirectoryError::NotFound {
                    user_id: user_id.to_string(),
                })
            }
            Ok((status, None)) => {
                error!(user_id = %user_id, status = %status, "User endpoint returned error status");
                Err(status_error(status))
            }
            Err(e) => Err(e),
        };

        record_user_fetch(&result);
        result
    }
}
