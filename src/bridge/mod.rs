//! Worker process supervision and the serialized RPC call path.
//!
//! A [`Bridge`] owns at most one live worker process at a time: its child
//! handle, the framed stdio channel, the healthy flag the HTTP readiness
//! probe consults, and the supervised background tasks (health monitor and
//! stderr drain) with their cancellation token.
//!
//! All RPC traffic funnels through one async mutex — the exclusion gate. A
//! second caller's request is not written to the channel until the first
//! caller's reply line has been fully read, because replies are attributed
//! purely by stream order.

pub mod health;
pub mod restart;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::rpc::client::{build_request, parse_reply};
use crate::rpc::{FramedChannel, WorkerChannel};
use crate::{AppError, Result};

/// A live worker process: child handle plus the framed stdio channel.
///
/// Exclusively owned by the bridge's gate; torn down on stop/restart.
#[derive(Debug)]
struct ManagedProcess {
    child: Child,
    channel: WorkerChannel,
}

/// Cancellation token and join handles for supervised background tasks.
#[derive(Debug, Default)]
struct SupervisedTasks {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

/// Supervisor for the worker process and single-flight RPC client.
#[derive(Debug)]
pub struct Bridge {
    config: Arc<Config>,
    /// Single source of truth consulted by the HTTP readiness probe.
    healthy: AtomicBool,
    next_id: AtomicU64,
    /// The exclusion gate: holds the process slot, serialises round trips.
    gate: Mutex<Option<ManagedProcess>>,
    policy: Mutex<restart::RestartPolicy>,
    tasks: std::sync::Mutex<SupervisedTasks>,
}

impl Bridge {
    /// Create a stopped bridge for the given configuration.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let policy = restart::RestartPolicy::new(
            config.worker.max_restart_attempts,
            config.worker.restart_window(),
        );
        Self {
            config,
            healthy: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            gate: Mutex::new(None),
            policy: Mutex::new(policy),
            tasks: std::sync::Mutex::new(SupervisedTasks::default()),
        }
    }

    /// The configuration this bridge was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the worker is currently considered healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Clear the healthy flag.
    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }

    /// Start the worker process and the supervised background tasks.
    ///
    /// Spawns the worker, performs the best-effort `initialize` handshake
    /// (a failure is logged, not fatal), marks the bridge healthy, and
    /// launches the health monitor.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`] if the worker executable cannot be
    /// spawned or its pipes cannot be captured.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let cancel = CancellationToken::new();
        {
            let mut tasks = self.lock_tasks();
            tasks.cancel = Some(cancel.clone());
        }

        self.start_process(&cancel).await?;

        let monitor = health::spawn_health_monitor(Arc::clone(self), cancel);
        self.lock_tasks().handles.push(monitor);

        Ok(())
    }

    /// Stop the worker and all supervised tasks. Idempotent.
    ///
    /// Cancels and joins the health monitor and stderr drains, then
    /// terminates the process: SIGTERM, a grace period, SIGKILL on overrun.
    pub async fn stop(&self) {
        let (cancel, handles) = {
            let mut tasks = self.lock_tasks();
            (tasks.cancel.take(), std::mem::take(&mut tasks.handles))
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "supervised task panicked during shutdown");
            }
        }

        self.terminate_process().await;
        info!("worker bridge stopped");
    }

    /// Restart the worker after consulting the restart policy.
    ///
    /// Tears down and respawns the process only; the health monitor that
    /// drives this call keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RestartExhausted`] when the policy refuses further
    /// attempts within the window, [`AppError::NotHealthy`] when the bridge
    /// has been stopped, or the underlying [`AppError::Launch`] failure.
    pub async fn restart(self: &Arc<Self>) -> Result<()> {
        let backoff = self.policy.lock().await.next_backoff(Instant::now());
        let Some(backoff) = backoff else {
            let msg = format!(
                "max restart attempts ({}) exceeded in {}s window",
                self.config.worker.max_restart_attempts,
                self.config.worker.restart_window_seconds,
            );
            error!("{msg}");
            return Err(AppError::RestartExhausted(msg));
        };

        let Some(cancel) = self.lock_tasks().cancel.clone() else {
            return Err(AppError::NotHealthy("bridge has been stopped".into()));
        };

        info!(backoff_secs = backoff.as_secs(), "restarting worker");
        tokio::time::sleep(backoff).await;

        self.terminate_process().await;
        self.start_process(&cancel).await?;
        info!("worker restarted");
        Ok(())
    }

    /// Issue one JSON-RPC call and read its reply.
    ///
    /// Fails fast with [`AppError::NotHealthy`] — without touching the
    /// channel — while the worker is down or restarting. Otherwise acquires
    /// the exclusion gate for the full round trip.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotHealthy`] — worker down or restarting.
    /// - [`AppError::EndOfStream`] — worker closed its stdout; the bridge is
    ///   marked unhealthy for the monitor to recover.
    /// - [`AppError::Protocol`] / [`AppError::Remote`] — per reply decoding.
    pub async fn call(&self, method: &str, params: &Value) -> Result<Value> {
        if !self.is_healthy() {
            return Err(AppError::NotHealthy("worker is not running".into()));
        }
        let mut slot = self.gate.lock().await;
        self.call_locked(&mut slot, method, params).await
    }

    /// Number of restart attempts currently recorded inside the policy
    /// window.
    pub async fn restart_attempts(&self) -> usize {
        self.policy.lock().await.recorded_attempts()
    }

    /// Discard one pending reply line left behind by an abandoned round trip.
    ///
    /// A probe that times out after its request was written leaves its reply
    /// unread; the next caller would consume it and every later round trip
    /// would be off by one line. Holding the gate, this waits up to `wait`
    /// for the stale line and drops it. When nothing arrives the channel was
    /// never desynced, or the worker is dead and the monitor escalates.
    pub async fn discard_stale_reply(&self, wait: Duration) {
        let mut slot = self.gate.lock().await;
        let Some(process) = slot.as_mut() else {
            return;
        };
        match tokio::time::timeout(wait, process.channel.receive_line()).await {
            Ok(Ok(Some(frame))) => {
                debug!(len = frame.len(), "discarded stale reply line");
            }
            Ok(Ok(None)) => self.mark_unhealthy(),
            Ok(Err(err)) => warn!(%err, "error discarding stale reply"),
            Err(_elapsed) => {}
        }
    }

    /// Check whether the worker process has exited, without blocking.
    ///
    /// Returns the exit code (`None` inside the option means killed by
    /// signal) when the process has terminated, or `None` while it is still
    /// running or no process exists.
    pub async fn poll_worker_exit(&self) -> Option<Option<i32>> {
        let mut slot = self.gate.lock().await;
        let process = slot.as_mut()?;
        match process.child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "failed to poll worker exit status");
                None
            }
        }
    }

    // ── Process lifecycle internals ──────────────────────────────────────

    /// Spawn the worker, wire up its pipes, handshake, mark healthy.
    async fn start_process(&self, cancel: &CancellationToken) -> Result<()> {
        let worker = &self.config.worker;
        let mut cmd = Command::new(&worker.command);
        cmd.args(&worker.args);
        if let Some(browser) = &worker.browser {
            cmd.arg("--browser").arg(browser);
        }
        if worker.headless {
            cmd.arg("--headless");
        }
        cmd.stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Launch(format!("failed to spawn worker: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture worker stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture worker stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture worker stderr".into()))?;

        info!(pid = child.id(), command = %worker.command, "worker spawned");

        let drain = spawn_stderr_drain(stderr, cancel.clone());
        self.lock_tasks().handles.push(drain);

        let channel = FramedChannel::new(stdin, BufReader::new(stdout));
        let mut slot = self.gate.lock().await;
        *slot = Some(ManagedProcess { child, channel });

        // Best-effort MCP handshake; a refusal must not abort startup.
        let init_params = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "browser-relay",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        match self.call_locked(&mut slot, "initialize", &init_params).await {
            Ok(result) => debug!(%result, "worker initialize handshake complete"),
            Err(err) => warn!(%err, "worker initialize failed (may be optional)"),
        }
        drop(slot);

        self.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Write one request and read exactly one reply line on the held gate.
    async fn call_locked(
        &self,
        slot: &mut MutexGuard<'_, Option<ManagedProcess>>,
        method: &str,
        params: &Value,
    ) -> Result<Value> {
        let process = slot
            .as_mut()
            .ok_or_else(|| AppError::NotHealthy("worker is not running".into()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = build_request(id, method, params);
        process.channel.send(&request).await?;

        match process.channel.receive_line().await? {
            Some(frame) => parse_reply(&frame),
            None => {
                // Zero bytes with nothing buffered: the worker is gone.
                self.mark_unhealthy();
                Err(AppError::EndOfStream)
            }
        }
    }

    /// Take the process out of the gate and terminate it. Idempotent.
    async fn terminate_process(&self) {
        self.mark_unhealthy();

        let process = self.gate.lock().await.take();
        let Some(mut process) = process else {
            return;
        };

        request_graceful_exit(&process.child);

        let grace = self.config.worker.shutdown_timeout();
        match tokio::time::timeout(grace, process.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "worker exited"),
            Ok(Err(err)) => warn!(%err, "error waiting for worker exit"),
            Err(_elapsed) => {
                warn!("graceful shutdown timeout, killing worker");
                if let Err(err) = process.child.kill().await {
                    warn!(%err, "failed to kill worker");
                }
            }
        }
    }

    /// Lock the task registry, recovering from a poisoned mutex.
    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, SupervisedTasks> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Send SIGTERM to the worker so it can shut the browser down cleanly.
#[cfg(unix)]
fn request_graceful_exit(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(%err, "failed to send SIGTERM to worker");
    }
}

/// No signal support off unix; the kill fallback in the caller applies.
#[cfg(not(unix))]
fn request_graceful_exit(_child: &Child) {}

/// Drain the worker's stderr into debug logs until EOF or cancellation.
fn spawn_stderr_drain(
    stderr: tokio::process::ChildStderr,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                line = lines.next_line() => match line {
                    Ok(Some(line)) => debug!(target: "browser_relay::worker", "{line}"),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "error draining worker stderr");
                        break;
                    }
                },
            }
        }
    })
}
