//! clerk-sync demo - one session driven over stdin/stdout
//!
//! Each stdin line is a signal:
//!
//! ```text
//! {"event":"token_presented","token":"eyJ..."}
//! {"event":"token_withdrawn"}
//! {"event":"clear_error"}
//! {"event":"refresh_user"}
//! ```
//!
//! Each line written to stdout is the session state after the signal (and
//! again whenever background enrichment changes it). Logs go to stderr.
//! Configure with `CLERK_*` environment variables, or pass a config file path
//! as the only argument.

use anyhow::Context;
use clerk_sync::{AuthState, ClerkSync, ClerkSyncConfig, Signal, telemetry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ClerkSyncConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => ClerkSyncConfig::from_env().context("loading configuration from environment")?,
    };
    telemetry::init_tracing(&config.logging)?;

    let runtime = ClerkSync::from_config(&config)?;
    let (bridge, task) = runtime.spawn_session();

    let mut updates = bridge.subscribe();
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            let line = render(&updates.borrow_and_update());
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    });

    info!("Reading session signals from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let signal: Signal = match serde_json::from_str(line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable signal");
                continue;
            }
        };

        let transition = bridge.send(signal).await?;
        info!(
            version = transition.version,
            phase = ?transition.phase,
            error = transition.error.as_ref().map(|e| e.user_message()),
            "Signal applied"
        );
    }

    drop(bridge);
    task.await?;
    printer.await?;
    Ok(())
}

fn render(state: &AuthState) -> String {
    match serde_json::to_string(state) {
        Ok(json) => format!("{json}\n"),
        Err(e) => format!("{{\"render_error\":\"{e}\"}}\n"),
    }
}
