//! Health monitor — detects worker exits and unresponsive workers.
//!
//! A background loop ticks at the configured interval. Each tick first
//! checks whether the worker process has exited, then issues a lightweight
//! `tools/list` probe with a short timeout. A dead process, or three
//! consecutive probe failures, clears the healthy flag and triggers one
//! restart attempt through the bridge's restart policy.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::Bridge;

/// Consecutive probe failures tolerated before a restart is triggered.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Spawn the health monitor loop for `bridge`.
///
/// The loop runs until `cancel` fires; cancellation is honoured promptly,
/// including between a tick and its probe. Restart failures are logged and
/// surface only as prolonged unhealthy state — the monitor never exits on
/// error.
#[must_use]
pub fn spawn_health_monitor(bridge: Arc<Bridge>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = bridge.config().worker.health_check_interval();
        let probe_timeout = bridge.config().worker.probe_timeout();
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("health monitor shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            // A dead process restarts immediately; no probe needed.
            if let Some(code) = bridge.poll_worker_exit().await {
                error!(exit_code = ?code, "worker process died");
                bridge.mark_unhealthy();
                attempt_restart(&bridge).await;
                consecutive_failures = 0;
                continue;
            }

            match tokio::time::timeout(probe_timeout, bridge.call("tools/list", &json!({}))).await
            {
                Ok(Ok(_)) => consecutive_failures = 0,
                Ok(Err(err)) => {
                    consecutive_failures += 1;
                    warn!(
                        %err,
                        failures = consecutive_failures,
                        "health probe failed"
                    );
                }
                Err(_elapsed) => {
                    consecutive_failures += 1;
                    warn!(failures = consecutive_failures, "health probe timed out");
                    // The abandoned probe's reply may still arrive; unread,
                    // it would desync every later round trip by one line.
                    bridge.discard_stale_reply(probe_timeout).await;
                }
            }

            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                error!(
                    failures = consecutive_failures,
                    "health probe failure threshold reached, marking unhealthy"
                );
                bridge.mark_unhealthy();
                attempt_restart(&bridge).await;
                consecutive_failures = 0;
            }
        }
    })
}

/// Run one restart attempt, absorbing any error into the log.
async fn attempt_restart(bridge: &Arc<Bridge>) {
    if let Err(err) = bridge.restart().await {
        error!(%err, "worker restart failed");
    }
}
