//! Ordered delivery of browser session signals
//!
//! The browser side (a cookie watcher, a websocket handler, a test harness)
//! pushes [`Signal`]s into a [`SyncBridge`]. One task owns the
//! [`SessionStateMachine`] and applies signals strictly in arrival order.
//! State flows back out through a [`watch`] receiver.

use crate::error::BridgeError;
use crate::session::{AuthState, SessionStateMachine, Transition};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default signal queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Session signal from the browser side
///
/// Serialized with an `event` tag, e.g.
/// `{"event":"token_presented","token":"eyJ..."}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Signal {
    /// A session token was observed
    TokenPresented {
        /// Compact JWT
        token: String,
    },
    /// The session token disappeared
    TokenWithdrawn,
    /// The UI dismissed the last error
    ClearError,
    /// Re-fetch the signed-in user's record
    RefreshUser,
}

impl Signal {
    /// Signal name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenPresented { .. } => "token_presented",
            Self::TokenWithdrawn => "token_withdrawn",
            Self::ClearError => "clear_error",
            Self::RefreshUser => "refresh_user",
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenPresented { .. } => f
                .debug_struct("TokenPresented")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::TokenWithdrawn => f.write_str("TokenWithdrawn"),
            Self::ClearError => f.write_str("ClearError"),
            Self::RefreshUser => f.write_str("RefreshUser"),
        }
    }
}

struct Envelope {
    signal: Signal,
    ack: Option<oneshot::Sender<Transition>>,
}

/// Handle for feeding signals to a session task
///
/// Cheap to clone. The session task stops once every handle is dropped and
/// queued signals are drained.
#[derive(Debug, Clone)]
pub struct SyncBridge {
    tx: mpsc::Sender<Envelope>,
    state: watch::Receiver<AuthState>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("signal", &self.signal)
            .field("ack", &self.ack.is_some())
            .finish()
    }
}

impl SyncBridge {
    /// Move `machine` into a new task and return a handle to it
    pub fn spawn(machine: SessionStateMachine) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(machine, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`spawn`](Self::spawn) with a custom queue depth
    pub fn spawn_with_capacity(
        machine: SessionStateMachine,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let state = machine.subscribe();
        let task = tokio::spawn(run(machine, rx));
        (Self { tx, state }, task)
    }

    /// Queue a signal and wait until it has been applied
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the session task has stopped.
    pub async fn send(&self, signal: Signal) -> Result<Transition, BridgeError> {
        let (ack, applied) = oneshot::channel();
        self.tx
            .send(Envelope {
                signal,
                ack: Some(ack),
            })
            .await
            .map_err(|_| BridgeError::Closed)?;
        applied.await.map_err(|_| BridgeError::Closed)
    }

    /// Queue a signal without waiting
    ///
    /// # Errors
    ///
    /// [`BridgeError::Full`] if the queue is at capacity,
    /// [`BridgeError::Closed`] if the session task has stopped.
    pub fn dispatch(&self, signal: Signal) -> Result<(), BridgeError> {
        self.tx
            .try_send(Envelope { signal, ack: None })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BridgeError::Full,
                mpsc::error::TrySendError::Closed(_) => BridgeError::Closed,
            })
    }

    /// Send [`Signal::TokenPresented`]
    pub async fn token_presented(
        &self,
        token: impl Into<String>,
    ) -> Result<Transition, BridgeError> {
        self.send(Signal::TokenPresented {
            token: token.into(),
        })
        .await
    }

    /// Send [`Signal::TokenWithdrawn`]
    pub async fn token_withdrawn(&self) -> Result<Transition, BridgeError> {
        self.send(Signal::TokenWithdrawn).await
    }

    /// Send [`Signal::ClearError`]
    pub async fn clear_error(&self) -> Result<Transition, BridgeError> {
        self.send(Signal::ClearError).await
    }

    /// Send [`Signal::RefreshUser`]
    pub async fn refresh_user(&self) -> Result<Transition, BridgeError> {
        self.send(Signal::RefreshUser).await
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }
}

async fn run(machine: SessionStateMachine, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { signal, ack }) = rx.recv().await {
        debug!(signal = signal.name(), "Applying session signal");
        let transition = apply(&machine, signal).await;
        if let Some(ack) = ack {
            // sender gave up waiting
            let _ = ack.send(transition);
        }
    }

    machine.settle().await;
    debug!("Session task stopped");
}

async fn apply(machine: &SessionStateMachine, signal: Signal) -> Transition {
    match signal {
        Signal::TokenPresented { token } => machine.token_presented(&token).await,
        Signal::TokenWithdrawn => machine.token_withdrawn(),
        Signal::ClearError => machine.clear_error(),
        Signal::RefreshUser => {
            if let Err(e) = machine.refresh_user().await {
                warn!(error = %e, "Requested user refresh failed");
            }
            machine.transition()
        }
    }
}
