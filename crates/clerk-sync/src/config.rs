//! Runtime configuration
//!
//! Settings come from `CLERK_*` environment variables, optionally layered on
//! top of a TOML, YAML or JSON file. Nested settings use `__`, for example
//! `CLERK_LOGGING__LEVEL=debug`.
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `CLERK_SECRET_KEY` | directory credential |
//! | `CLERK_JWT_PUBLIC_KEYS` | static keys as JSON (JWKS, key array or one key) |
//! | `CLERK_API_BASE_URL` | directory base URL |
//! | `CLERK_FETCH_USER_ON_AUTH` | fetch the user after sign-in |
//! | `CLERK_WITHDRAW_POLICY` | `retain_identity` or `clear_identity` |
//! | `CLERK_CLOCK_SKEW_SECS` | `exp`/`nbf` leeway |
//! | `CLERK_EXPECTED_ISSUER` | required `iss`, if any |
//! | `CLERK_REQUEST_TIMEOUT_SECS` | directory request timeout |
//! | `CLERK_MIN_KEY_REFRESH_SECS` | minimum time between key set refreshes |

use crate::error::ConfigError;
use crate::session::{SessionOptions, WithdrawPolicy};
use clerk_sync_auth::directory::DEFAULT_API_BASE_URL;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "CLERK";

/// Top-level configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClerkSyncConfig {
    /// Directory credential. Enables the remote key set and user fetches.
    #[serde(deserialize_with = "deserialize_optional_secret")]
    pub secret_key: Option<SecretString>,

    /// Static verification keys as JSON. Take priority over the directory.
    #[serde(deserialize_with = "deserialize_non_blank")]
    pub jwt_public_keys: Option<String>,

    /// Directory API base URL
    pub api_base_url: String,

    /// Fetch the user record after each sign-in
    pub fetch_user_on_auth: bool,

    /// Identity handling on sign-out
    pub withdraw_policy: WithdrawPolicy,

    /// Leeway for `exp` and `nbf`, in seconds
    pub clock_skew_secs: u64,

    /// Required `iss` claim
    #[serde(deserialize_with = "deserialize_non_blank")]
    pub expected_issuer: Option<String>,

    /// Directory request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Minimum time between key set refreshes, in seconds
    pub min_key_refresh_secs: u64,

    /// Log output
    pub logging: LoggingConfig,
}

impl Default for ClerkSyncConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            jwt_public_keys: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            fetch_user_on_auth: true,
            withdraw_policy: WithdrawPolicy::default(),
            clock_skew_secs: 5,
            expected_issuer: None,
            request_timeout_secs: 10,
            min_key_refresh_secs: 5,
            logging: LoggingConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClerkSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkSyncConfig")
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwt_public_keys", &self.jwt_public_keys.is_some())
            .field("api_base_url", &self.api_base_url)
            .field("fetch_user_on_auth", &self.fetch_user_on_auth)
            .field("withdraw_policy", &self.withdraw_policy)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("expected_issuer", &self.expected_issuer)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("min_key_refresh_secs", &self.min_key_refresh_secs)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
        }
    }
}

impl ClerkSyncConfig {
    /// Load from `CLERK_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load from environment variables with a custom prefix
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment(prefix))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from an explicit set of `CLERK_*` variables instead of the
    /// process environment
    ///
    /// ```
    /// use clerk_sync::ClerkSyncConfig;
    ///
    /// let config = ClerkSyncConfig::from_env_vars([
    ///     ("CLERK_SECRET_KEY", "sk_test_123"),
    ///     ("CLERK_FETCH_USER_ON_AUTH", "false"),
    /// ])
    /// .unwrap();
    ///
    /// assert!(config.secret_key.is_some());
    /// assert!(!config.fetch_user_on_auth);
    /// ```
    pub fn from_env_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: config::Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        let config = config::Config::builder()
            .add_source(environment(DEFAULT_ENV_PREFIX).source(Some(vars)))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a configuration file
    ///
    /// Format follows the extension (`.toml`, `.yaml`/`.yml`, `.json`).
    /// `CLERK_*` environment variables override file settings.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment(DEFAULT_ENV_PREFIX))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Whether a directory credential is configured
    pub fn has_secret_key(&self) -> bool {
        self.secret_key
            .as_ref()
            .is_some_and(|secret| !secret.expose_secret().trim().is_empty())
    }

    /// Session behavior derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            fetch_user_on_auth: self.fetch_user_on_auth,
            withdraw_policy: self.withdraw_policy,
        }
    }

    /// `exp`/`nbf` leeway
    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Directory request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Minimum time between key set refreshes
    pub fn min_key_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_key_refresh_secs)
    }
}

fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// Blank values count as unset
fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_non_blank(deserializer)?.map(SecretString::new))
}

fn deserialize_non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}
