//! # clerk-sync
//!
//! Keeps server-side authentication state in step with the session token a
//! browser holds.
//!
//! The browser reports when a session token appears or disappears. Each
//! visitor gets a [`SessionStateMachine`] that verifies presented tokens
//! against the provider's signing keys, publishes a versioned [`AuthState`]
//! and fetches the user's profile in the background. A newer signal always
//! supersedes older in-flight work.
//!
//! ## Crates
//!
//! - [`types`] - keys, claims, user records and error types
//! - [`auth`] - key set cache, token verifier and directory client
//! - this crate - session state, signal bridge, configuration and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use clerk_sync::{ClerkSync, ClerkSyncConfig, telemetry};
//!
//! # tokio_test::block_on(async {
//! let config = ClerkSyncConfig::from_env()?;
//! telemetry::init_tracing(&config.logging)?;
//!
//! let runtime = ClerkSync::from_config(&config)?;
//! let (bridge, _task) = runtime.spawn_session();
//!
//! let transition = bridge.token_presented("eyJhbGciOiJSUzI1NiIs...").await?;
//! if transition.signed_in {
//!     let mut state = bridge.subscribe();
//!     state.changed().await?;
//!     println!("{:?}", state.borrow().user);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use bridge::{Signal, SyncBridge};
pub use config::{ClerkSyncConfig, LoggingConfig};
pub use error::{BridgeError, ConfigError, TelemetryError};
pub use runtime::{ClerkSync, ClerkSyncBuilder};
pub use session::{
    AuthState, SessionOptions, SessionPhase, SessionStateMachine, Transition, WithdrawPolicy,
};

pub use clerk_sync_auth as auth;
pub use clerk_sync_types as types;

pub use clerk_sync_auth::{
    DirectoryConfig, HttpDirectoryClient, KeySetCache, RemoteDirectory, TokenVerifier,
};
pub use clerk_sync_types::{
    AuthError, ConfigurationError, DirectoryError, KeySet, SessionClaims, SigningKey, UserRecord,
    VerificationError,
};
