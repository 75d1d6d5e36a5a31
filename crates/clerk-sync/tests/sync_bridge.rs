//! Sync bridge tests
//!
//! Signals sent through `SyncBridge` are applied one at a time, in order,
//! and every observer sees the same final state.

mod common;

use clerk_sync::{AuthState, BridgeError, SessionOptions, SessionPhase, Signal, SyncBridge};
use clerk_sync_auth::testutil::{MockDirectory, PRIMARY_KEY, ROTATED_KEY};
use clerk_sync_types::UserRecord;
use common::{clear_identity, no_fetch, static_session};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn spawn(options: SessionOptions) -> (SyncBridge, Arc<MockDirectory>) {
    let directory = Arc::new(
        MockDirectory::new()
            .with_user(UserRecord::with_id("user_1"))
            .with_user(UserRecord::with_id("user_2")),
    );
    let session = Arc::try_unwrap(static_session(&directory, options))
        .expect("session not shared yet");
    let (bridge, _task) = SyncBridge::spawn(session);
    (bridge, directory)
}

#[tokio::test]
async fn test_signals_applied_in_order() {
    // GIVEN: A bridge with no user fetching
    let (bridge, _directory) = spawn(no_fetch());

    // WHEN: Signals are dispatched without waiting, then one is awaited
    bridge
        .dispatch(Signal::TokenPresented {
            token: PRIMARY_KEY.token("user_1"),
        })
        .unwrap();
    bridge.dispatch(Signal::TokenWithdrawn).unwrap();
    bridge
        .dispatch(Signal::TokenPresented {
            token: ROTATED_KEY.token("user_2"),
        })
        .unwrap();
    let last = bridge.clear_error().await.unwrap();

    // THEN: The last presented token decides the outcome
    assert_eq!(last.version, 3);
    assert_eq!(last.phase, SessionPhase::SignedIn);
    assert_eq!(bridge.state().user_id.as_deref(), Some("user_2"));
}

#[tokio::test]
async fn test_withdraw_after_present_always_signs_out() {
    let (bridge, _directory) = spawn(no_fetch());

    bridge
        .dispatch(Signal::TokenPresented {
            token: PRIMARY_KEY.token("user_1"),
        })
        .unwrap();
    let transition = bridge.token_withdrawn().await.unwrap();

    assert_eq!(transition.phase, SessionPhase::SignedOut);
    assert!(!bridge.state().signed_in);
}

#[tokio::test]
async fn test_refresh_user_through_bridge() {
    // GIVEN: Signed in without automatic enrichment
    let (bridge, directory) = spawn(no_fetch());
    bridge
        .token_presented(PRIMARY_KEY.token("user_1"))
        .await
        .unwrap();
    assert!(bridge.state().user.is_none());

    // WHEN: The UI asks for a refresh
    let transition = bridge.refresh_user().await.unwrap();

    // THEN: The record is stored without a version bump
    assert_eq!(transition.version, 1);
    assert_eq!(
        bridge.state().user.map(|u| u.id).as_deref(),
        Some("user_1")
    );
    assert_eq!(directory.user_calls(), 1);
}

#[tokio::test]
async fn test_clones_share_one_session() {
    let (bridge, _directory) = spawn(no_fetch());
    let other = bridge.clone();
    let mut updates = other.subscribe();

    bridge
        .token_presented(PRIMARY_KEY.token("user_1"))
        .await
        .unwrap();

    updates
        .wait_for(|state| state.phase == SessionPhase::SignedIn)
        .await
        .unwrap();
    assert_eq!(other.state().user_id.as_deref(), Some("user_1"));
}

#[tokio::test]
async fn test_handles_fail_after_task_ends() {
    let directory = Arc::new(MockDirectory::new());
    let session = Arc::try_unwrap(static_session(&directory, no_fetch()))
        .expect("session not shared yet");
    let (short_lived, task) = SyncBridge::spawn(session);
    task.abort();
    let _ = task.await;

    assert_eq!(
        short_lived.token_withdrawn().await.unwrap_err(),
        BridgeError::Closed
    );
}

fn signal_strategy() -> impl Strategy<Value = Signal> {
    prop_oneof![
        Just(Signal::TokenWithdrawn),
        Just(Signal::ClearError),
        Just(Signal::RefreshUser),
        Just(Signal::TokenPresented {
            token: "garbage".to_string()
        }),
        (0..2usize).prop_map(|i| Signal::TokenPresented {
            token: PRIMARY_KEY.token(["user_1", "user_2"][i])
        }),
    ]
}

fn without_version(mut state: AuthState) -> AuthState {
    state.version = 0;
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Withdrawing twice leaves the same state as withdrawing once
    #[test]
    fn prop_withdraw_is_idempotent(
        signals in prop::collection::vec(signal_strategy(), 0..8),
        clear in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let options = if clear { clear_identity() } else { no_fetch() };
            let (bridge, _directory) = spawn(options);

            for signal in signals {
                bridge.send(signal).await.unwrap();
            }

            let once = bridge.token_withdrawn().await.unwrap();
            let after_once = bridge.state();
            let twice = bridge.token_withdrawn().await.unwrap();
            let after_twice = bridge.state();

            prop_assert_eq!(once.phase, SessionPhase::SignedOut);
            prop_assert_eq!(twice.version, once.version + 1);
            prop_assert!(after_twice.last_error.is_none());
            prop_assert!(after_twice.claims.is_none());
            prop_assert_eq!(without_version(after_once), without_version(after_twice));
            Ok(())
        })?;
    }

    /// Whatever came before, the state after the last signal is consistent
    #[test]
    fn prop_state_invariants_hold(
        signals in prop::collection::vec(signal_strategy(), 1..10),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (bridge, _directory) = spawn(no_fetch());
            let presented = signals
                .iter()
                .filter(|s| matches!(s, Signal::TokenPresented { .. } | Signal::TokenWithdrawn))
                .count() as u64;

            for signal in signals {
                bridge.send(signal).await.unwrap();
            }
            let state = bridge.state();

            prop_assert_eq!(state.version, presented);
            prop_assert_eq!(state.signed_in, state.phase == SessionPhase::SignedIn);
            prop_assert_eq!(state.signed_in, state.claims.is_some());
            if let (Some(user), Some(user_id)) = (&state.user, &state.user_id) {
                prop_assert_eq!(&user.id, user_id);
            }
            prop_assert_ne!(state.phase, SessionPhase::Verifying);
            Ok(())
        })?;
    }
}
