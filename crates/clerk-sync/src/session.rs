//! Per-visitor authentication state
//!
//! [`SessionStateMachine`] turns the browser's session signals into a
//! versioned [`AuthState`]:
//!
//! ```text
//!              token_presented                 verified
//!  SignedOut ─────────────────▶ Verifying ─────────────────▶ SignedIn
//!      ▲                            │                            │
//!      │        rejected            │                            │
//!      ├────────────────────────────┘                            │
//!      │                      token_withdrawn                    │
//!      └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `token_presented` and `token_withdrawn` bumps `version`. Work that
//! completes later (a verification that had to load keys, a background user
//! fetch) is applied only if the version it started under is still current,
//! so a withdraw always wins over an older in-flight sign-in.

use clerk_sync_auth::{RemoteDirectory, TokenVerifier};
use clerk_sync_types::{AuthError, DirectoryError, SessionClaims, UserRecord, VerificationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No verified token. `last_error` tells a rejected token apart from a
    /// plain sign-out.
    #[default]
    SignedOut,
    /// A presented token is being verified
    Verifying,
    /// The latest presented token verified
    SignedIn,
}

/// What `token_withdrawn` does with the identity fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawPolicy {
    /// Keep `user_id` and `user` after sign-out
    #[default]
    RetainIdentity,
    /// Clear `user_id` and `user` on sign-out
    ClearIdentity,
}

/// Behavior switches for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Fetch the user record in the background after each sign-in
    pub fetch_user_on_auth: bool,
    /// Identity handling on sign-out and on rejected tokens
    pub withdraw_policy: WithdrawPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fetch_user_on_auth: true,
            withdraw_policy: WithdrawPolicy::default(),
        }
    }
}

/// Authentication state of one visitor, as rendered by the UI
///
/// `signed_in` implies `claims` is set. `user`, when set, belongs to
/// `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthState {
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Bumped by every presented or withdrawn token
    pub version: u64,
    /// Whether the latest presented token verified
    pub signed_in: bool,
    /// Claims of the latest verified token
    pub claims: Option<SessionClaims>,
    /// Subject of the latest verified token
    pub user_id: Option<String>,
    /// Directory record for `user_id`, once fetched
    pub user: Option<UserRecord>,
    /// Why the latest presented token was rejected
    pub last_error: Option<AuthError>,
}

impl AuthState {
    /// Human-readable reason for the last rejection
    pub fn error_message(&self) -> Option<&'static str> {
        self.last_error.as_ref().map(AuthError::user_message)
    }

    fn forget_identity(&mut self) {
        self.user_id = None;
        self.user = None;
    }
}

/// Outcome of one session signal, returned to the signal's sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    /// State version after the signal
    pub version: u64,
    /// Phase after the signal
    pub phase: SessionPhase,
    /// Whether the session is signed in after the signal
    pub signed_in: bool,
    /// Rejection reason, if the signal left one
    pub error: Option<AuthError>,
}

impl Transition {
    fn of(state: &AuthState) -> Self {
        Self {
            version: state.version,
            phase: state.phase,
            signed_in: state.signed_in,
            error: state.last_error.clone(),
        }
    }
}

/// Drives one visitor's [`AuthState`] from session signals
///
/// Shares the verifier (and through it the key cache) and the directory with
/// every other session. State is published on a [`watch`] channel.
pub struct SessionStateMachine {
    verifier: Arc<TokenVerifier>,
    directory: Option<Arc<dyn RemoteDirectory>>,
    options: SessionOptions,
    state: Arc<watch::Sender<AuthState>>,
    enrichment: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionStateMachine")
            .field("options", &self.options)
            .field("has_directory", &self.directory.is_some())
            .field("phase", &state.phase)
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

impl SessionStateMachine {
    /// Create a signed-out session
    pub fn new(
        verifier: Arc<TokenVerifier>,
        directory: Option<Arc<dyn RemoteDirectory>>,
        options: SessionOptions,
    ) -> Self {
        if options.fetch_user_on_auth && directory.is_none() {
            warn!("fetch_user_on_auth is enabled but no directory is configured; users will not be fetched");
        }

        Self {
            verifier,
            directory,
            options,
            state: Arc::new(watch::Sender::new(AuthState::default())),
            enrichment: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Session options
    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Current state version
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The current state summarized as a [`Transition`]
    pub fn transition(&self) -> Transition {
        Transition::of(&self.state.borrow())
    }

    /// The browser observed a session token
    ///
    /// Verifies the token and moves to `SignedIn` or back to `SignedOut`
    /// with `last_error` set. Verification failures are reported in the
    /// returned [`Transition`], not as an error. If another token is
    /// presented or withdrawn while this one verifies, this outcome is
    /// dropped.
    pub async fn token_presented(&self, token: &str) -> Transition {
        let mut version = 0;
        self.state.send_modify(|state| {
            state.version += 1;
            state.phase = SessionPhase::Verifying;
            version = state.version;
        });
        debug!(version, "Verifying presented session token");

        let result = self.verifier.verify(token).await;

        let mut transition = None;
        let mut enrich_user = None;
        self.state.send_if_modified(|state| {
            if state.version != version {
                debug!(
                    version,
                    current = state.version,
                    "Session changed during verification, dropping result"
                );
                transition = Some(Transition::of(state));
                return false;
            }

            match result {
                Ok(claims) => {
                    enrich_user = Some(claims.subject.clone());
                    self.apply_verified(state, claims);
                }
                Err(error) => self.apply_rejected(state, error),
            }
            transition = Some(Transition::of(state));
            true
        });

        if let Some(user_id) = enrich_user
            && self.options.fetch_user_on_auth
        {
            self.spawn_enrichment(version, user_id);
        }

        transition.unwrap_or_else(|| self.transition())
    }

    /// The browser observed that the session token is gone
    ///
    /// Always ends `SignedOut` with no claims and no error. Identity fields
    /// follow the [`WithdrawPolicy`]. Repeating the call changes nothing but
    /// the version.
    pub fn token_withdrawn(&self) -> Transition {
        let mut transition = None;
        self.state.send_modify(|state| {
            state.version += 1;
            state.phase = SessionPhase::SignedOut;
            state.signed_in = false;
            state.claims = None;
            state.last_error = None;
            if self.options.withdraw_policy == WithdrawPolicy::ClearIdentity {
                state.forget_identity();
            }
            transition = Some(Transition::of(state));
        });
        info!(version = self.version(), "Session token withdrawn");
        transition.unwrap_or_else(|| self.transition())
    }

    /// Dismiss the last rejection reason. Does not bump the version.
    pub fn clear_error(&self) -> Transition {
        self.state
            .send_if_modified(|state| state.last_error.take().is_some());
        self.transition()
    }

    /// Fetch the signed-in user's record now
    ///
    /// Returns `Ok(true)` if a fresh record was stored and `Ok(false)` when
    /// there was nothing to do (not signed in, no directory) or the session
    /// moved on while the request was in flight.
    ///
    /// # Errors
    ///
    /// Returns the [`DirectoryError`] from the fetch. The session state is
    /// not changed by a failed fetch.
    pub async fn refresh_user(&self) -> Result<bool, DirectoryError> {
        let (version, user_id) = {
            let state = self.state.borrow();
            match (&state.phase, &state.user_id) {
                (SessionPhase::SignedIn, Some(user_id)) => (state.version, user_id.clone()),
                _ => return Ok(false),
            }
        };

        let Some(directory) = &self.directory else {
            warn!("User refresh requested but no directory is configured");
            return Ok(false);
        };

        match directory.fetch_user(&user_id).await {
            Ok(user) => Ok(store_user(&self.state, version, &user_id, user)),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "User refresh failed");
                Err(e)
            }
        }
    }

    /// Wait for in-flight background user fetches to finish
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *self.enrichment.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "User enrichment task failed");
            }
        }
    }

    fn apply_verified(&self, state: &mut AuthState, claims: SessionClaims) {
        info!(
            version = state.version,
            user_id = %claims.subject,
            "Session token verified"
        );

        if state.user.as_ref().is_some_and(|user| user.id != claims.subject) {
            state.user = None;
        }
        state.user_id = Some(claims.subject.clone());
        state.claims = Some(claims);
        state.signed_in = true;
        state.phase = SessionPhase::SignedIn;
        state.last_error = None;
    }

    fn apply_rejected(&self, state: &mut AuthState, error: VerificationError) {
        warn!(version = state.version, error = %error, "Session token rejected");

        state.phase = SessionPhase::SignedOut;
        state.signed_in = false;
        state.claims = None;
        state.last_error = Some(AuthError::from(error));
        if self.options.withdraw_policy == WithdrawPolicy::ClearIdentity {
            state.forget_identity();
        }
    }

    fn spawn_enrichment(&self, version: u64, user_id: String) {
        let Some(directory) = self.directory.clone() else {
            return;
        };
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            debug!(version, user_id = %user_id, "Fetching user record");
            match directory.fetch_user(&user_id).await {
                Ok(user) => {
                    store_user(&state, version, &user_id, user);
                }
                Err(e) => warn!(user_id = %user_id, error = %e, "User fetch failed"),
            }
        });

        let mut tasks = self.enrichment.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

/// Store a fetched user if the session it was fetched for is still current
fn store_user(
    state: &watch::Sender<AuthState>,
    version: u64,
    user_id: &str,
    user: UserRecord,
) -> bool {
    if user.id != user_id {
        warn!(
            requested = %user_id,
            returned = %user.id,
            "Directory returned a different user, ignoring"
        );
        return false;
    }

    state.send_if_modified(|state| {
        let current = state.version == version
            && state.phase == SessionPhase::SignedIn
            && state.user_id.as_deref() == Some(user_id);
        if current {
            debug!(version, user_id = %user_id, "User record stored");
            state.user = Some(user);
        } else {
            debug!(
                version,
                current = state.version,
                "Session changed during user fetch, dropping record"
            );
        }
        current
    })
}
