//! Process-wide wiring
//!
//! [`ClerkSync`] owns what every session shares: the key set cache, the
//! verifier built on it and the directory client. Sessions are created from
//! it per visitor.

use crate::bridge::SyncBridge;
use crate::config::ClerkSyncConfig;
use crate::session::{SessionOptions, SessionStateMachine, WithdrawPolicy};
use clerk_sync_auth::jwt::{Algorithm, DEFAULT_CLOCK_SKEW, DEFAULT_MIN_REFRESH_INTERVAL};
use clerk_sync_auth::{
    DirectoryConfig, HttpDirectoryClient, KeySetCache, RemoteDirectory, TokenVerifier,
};
use clerk_sync_types::{ConfigurationError, KeySet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared verification and directory services
#[derive(Debug, Clone)]
pub struct ClerkSync {
    key_cache: Arc<KeySetCache>,
    verifier: Arc<TokenVerifier>,
    directory: Option<Arc<dyn RemoteDirectory>>,
    options: SessionOptions,
}

impl ClerkSync {
    /// Start building from parts
    pub fn builder() -> ClerkSyncBuilder {
        ClerkSyncBuilder::default()
    }

    /// Build from loaded configuration
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidStaticKeys`] if `jwt_public_keys` does not parse
    /// - [`ConfigurationError::InvalidBaseUrl`] if `api_base_url` is unusable
    /// - [`ConfigurationError::NoKeySource`] if neither keys nor a secret key are set
    /// - [`ConfigurationError::MissingCredential`] if user fetching is on without a secret key
    pub fn from_config(config: &ClerkSyncConfig) -> Result<Self, ConfigurationError> {
        let static_keys = match config.jwt_public_keys.as_deref() {
            Some(text) => KeySet::from_json(text)?,
            None => KeySet::empty(),
        };

        let mut builder = Self::builder()
            .static_keys(static_keys)
            .session_options(config.session_options())
            .clock_skew(config.clock_skew())
            .min_key_refresh_interval(config.min_key_refresh_interval());

        if let Some(issuer) = &config.expected_issuer {
            builder = builder.issuer(issuer.clone());
        }

        if let Some(secret_key) = config.secret_key.clone() {
            let client = HttpDirectoryClient::new(
                DirectoryConfig::new(secret_key)
                    .with_base_url(config.api_base_url.clone())
                    .with_timeout(config.request_timeout()),
            )?;
            builder = builder.directory(Arc::new(client));
        }

        builder.build()
    }

    /// A new signed-out session sharing this runtime's services
    pub fn session(&self) -> SessionStateMachine {
        SessionStateMachine::new(
            Arc::clone(&self.verifier),
            self.directory.clone(),
            self.options,
        )
    }

    /// A new session running on its own task
    pub fn spawn_session(&self) -> (SyncBridge, JoinHandle<()>) {
        SyncBridge::spawn(self.session())
    }

    /// Shared key set cache
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    /// Shared verifier
    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }

    /// Directory client, if a credential was configured
    pub fn directory(&self) -> Option<&Arc<dyn RemoteDirectory>> {
        self.directory.as_ref()
    }

    /// Options given to new sessions
    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Reload the key set now, e.g. after a known key rotation
    pub async fn force_refresh_keys(&self) -> Arc<KeySet> {
        self.key_cache.force_refresh().await
    }
}

/// Builder for [`ClerkSync`]
#[derive(Debug)]
pub struct ClerkSyncBuilder {
    static_keys: KeySet,
    directory: Option<Arc<dyn RemoteDirectory>>,
    options: SessionOptions,
    clock_skew: Duration,
    min_key_refresh_interval: Duration,
    algorithms: Option<Vec<Algorithm>>,
    issuer: Option<String>,
}

impl Default for ClerkSyncBuilder {
    fn default() -> Self {
        Self {
            static_keys: KeySet::empty(),
            directory: None,
            options: SessionOptions::default(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            min_key_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            algorithms: None,
            issuer: None,
        }
    }
}

impl ClerkSyncBuilder {
    /// Keys that take priority over the directory's key set
    pub fn static_keys(mut self, keys: KeySet) -> Self {
        self.static_keys = keys;
        self
    }

    /// Remote directory for key sets and user records
    pub fn directory(mut self, directory: Arc<dyn RemoteDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Replace all session options
    pub fn session_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetch the user record after each sign-in
    pub fn fetch_user_on_auth(mut self, enabled: bool) -> Self {
        self.options.fetch_user_on_auth = enabled;
        self
    }

    /// Identity handling on sign-out
    pub fn withdraw_policy(mut self, policy: WithdrawPolicy) -> Self {
        self.options.withdraw_policy = policy;
        self
    }

    /// Leeway for `exp` and `nbf`
    pub fn clock_skew(mut self, leeway: Duration) -> Self {
        self.clock_skew = leeway;
        self
    }

    /// Minimum time between key set refreshes (default 5 s)
    pub fn min_key_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_key_refresh_interval = interval;
        self
    }

    /// Accepted signing algorithms (default RS256 only)
    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = Some(algorithms);
        self
    }

    /// Require this `iss` claim
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Validate and assemble
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::NoKeySource`] with no keys and no directory,
    /// [`ConfigurationError::MissingCredential`] if user fetching is on
    /// without a directory.
    pub fn build(self) -> Result<ClerkSync, ConfigurationError> {
        if self.static_keys.is_empty() && self.directory.is_none() {
            return Err(ConfigurationError::NoKeySource);
        }
        if self.options.fetch_user_on_auth && self.directory.is_none() {
            return Err(ConfigurationError::MissingCredential);
        }

        info!(
            static_keys = self.static_keys.len(),
            directory = self.directory.is_some(),
            fetch_user_on_auth = self.options.fetch_user_on_auth,
            withdraw_policy = ?self.options.withdraw_policy,
            "Session sync configured"
        );

        let key_cache = Arc::new(
            KeySetCache::new(self.static_keys, self.directory.clone())
                .with_min_refresh_interval(self.min_key_refresh_interval),
        );

        let mut verifier =
            TokenVerifier::new(Arc::clone(&key_cache)).with_clock_skew(self.clock_skew);
        if let Some(algorithms) = self.algorithms {
            verifier = verifier.with_algorithms(algorithms);
        }
        if let Some(issuer) = self.issuer {
            verifier = verifier.with_issuer(issuer);
        }

        Ok(ClerkSync {
            key_cache,
            verifier: Arc::new(verifier),
            directory: self.directory,
            options: self.options,
        })
    }
}
