//! Bridge lifecycle tests against stub workers scripted in `sh`.
//!
//! Each stub speaks the wire protocol for real: newline-delimited JSON over
//! stdio, one reply line per request line (except where a test needs a
//! misbehaving worker).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use browser_relay::bridge::Bridge;
use browser_relay::config::{Config, WorkerConfig};
use browser_relay::rpc::client::build_request;
use browser_relay::AppError;

/// Replies to every request line with a fixed success frame.
const ECHO_WORKER: &str = r#"while IFS= read -r line; do
    printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"ok":true}}'
done"#;

/// Replies to every request line with a result well past any buffer size.
const OVERSIZED_WORKER: &str = r#"big=$(head -c 200000 /dev/zero | tr '\0' 'a')
while IFS= read -r line; do
    printf '{"jsonrpc":"2.0","id":1,"result":{"blob":"%s"}}\n' "$big"
done"#;

/// Answers the handshake, then exits.
const ONE_SHOT_WORKER: &str = r#"IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"ok":true}}'"#;

/// Holds each reply back briefly, then echoes the request line's byte
/// length. A crossed reply is detectable because each caller knows the
/// length of the request it wrote.
const LENGTH_ECHO_WORKER: &str = r#"while IFS= read -r line; do
    sleep 0.2
    printf '{"jsonrpc":"2.0","id":1,"result":{"len":%s}}\n' "${#line}"
done"#;

/// Emits every reply twice, leaving one stale line pending per request.
const DOUBLE_REPLY_WORKER: &str = r#"n=0
while IFS= read -r line; do
    n=$((n+1))
    printf '{"jsonrpc":"2.0","id":1,"result":{"seq":%s}}\n' "$n"
    printf '{"jsonrpc":"2.0","id":1,"result":{"seq":%s}}\n' "$n"
done"#;

fn stub_config(script: &str) -> Arc<Config> {
    // A long tick keeps the health monitor out of tests that don't need it.
    stub_config_with_interval(script, 3600)
}

fn stub_config_with_interval(script: &str, interval_secs: u64) -> Arc<Config> {
    let worker = WorkerConfig {
        command: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        health_check_interval_seconds: interval_secs,
        shutdown_timeout_seconds: 1,
        ..WorkerConfig::default()
    };
    Arc::new(Config {
        worker,
        ..Config::from_env().expect("baseline config")
    })
}

async fn started_bridge(script: &str) -> Arc<Bridge> {
    let bridge = Arc::new(Bridge::new(stub_config(script)));
    bridge.start().await.expect("stub worker must start");
    bridge
}

#[tokio::test]
async fn start_marks_the_bridge_healthy() {
    let bridge = started_bridge(ECHO_WORKER).await;
    assert!(bridge.is_healthy());
    bridge.stop().await;
    assert!(!bridge.is_healthy());
}

#[tokio::test]
async fn call_round_trips_through_the_worker() {
    let bridge = started_bridge(ECHO_WORKER).await;

    let result = bridge
        .call("tools/list", &json!({}))
        .await
        .expect("call must succeed");
    assert_eq!(result["ok"], json!(true));

    bridge.stop().await;
}

#[tokio::test]
async fn oversized_reply_is_reassembled_losslessly() {
    let bridge = started_bridge(OVERSIZED_WORKER).await;

    let result = bridge
        .call("tools/call", &json!({"name": "browser_snapshot"}))
        .await
        .expect("oversized reply must decode");
    let blob = result["blob"].as_str().expect("blob field");
    assert_eq!(blob.len(), 200_000);
    assert!(blob.bytes().all(|b| b == b'a'));

    bridge.stop().await;
}

/// Wire length of a call as the worker will see it (no trailing newline).
fn frame_len(method: &str, params: &Value) -> usize {
    // The two concurrent calls get ids 2 and 3 (the handshake took 1);
    // both are one digit wide, so the length is fixed before the race.
    serde_json::to_vec(&build_request(2, method, params))
        .expect("request must serialize")
        .len()
}

#[tokio::test]
async fn concurrent_calls_each_receive_their_own_reply() {
    let bridge = started_bridge(LENGTH_ECHO_WORKER).await;

    let alpha = json!({"tag": "alpha"});
    let beta = json!({"tag": "beta-with-a-longer-tag"});
    let alpha_len = frame_len("alpha/call", &alpha);
    let beta_len = frame_len("beta/call", &beta);
    assert_ne!(alpha_len, beta_len, "the two requests must be distinguishable");

    let (first, second) = tokio::join!(
        bridge.call("alpha/call", &alpha),
        bridge.call("beta/call", &beta),
    );
    let first = first.expect("first call must succeed");
    let second = second.expect("second call must succeed");

    // Were the second request written before the first's delayed reply had
    // been read, the replies would cross and the echoed lengths would swap.
    // The gate holds each round trip exclusively, so every caller gets the
    // reply to exactly the request it wrote.
    assert_eq!(first["len"], json!(alpha_len));
    assert_eq!(second["len"], json!(beta_len));

    bridge.stop().await;
}

#[tokio::test]
async fn dead_worker_is_restarted_once_by_the_health_monitor() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("respawned");
    // First spawn answers the handshake and dies with a nonzero code; the
    // respawn (marker present) is a long-lived echo worker.
    let script = format!(
        r#"if [ -e "{marker}" ]; then
    while IFS= read -r line; do
        printf '%s\n' '{{"jsonrpc":"2.0","id":1,"result":{{"ok":true}}}}'
    done
else
    : > "{marker}"
    IFS= read -r line
    printf '%s\n' '{{"jsonrpc":"2.0","id":1,"result":{{"ok":true}}}}'
    exit 7
fi"#,
        marker = marker.display()
    );

    let bridge = Arc::new(Bridge::new(stub_config_with_interval(&script, 1)));
    bridge.start().await.expect("stub worker must start");
    assert_eq!(bridge.restart_attempts().await, 0);

    // One tick to notice the exit, one second of backoff before the respawn.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while !(bridge.is_healthy() && bridge.restart_attempts().await == 1) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker was not restarted within the deadline"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Let another tick probe the live respawn: still exactly one attempt.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(bridge.restart_attempts().await, 1);
    assert!(bridge.is_healthy());

    let result = bridge
        .call("tools/list", &json!({}))
        .await
        .expect("restarted worker must serve calls");
    assert_eq!(result["ok"], json!(true));

    bridge.stop().await;
}

#[tokio::test]
async fn discarding_a_stale_reply_realigns_the_channel() {
    // The duplicate reply to the startup handshake leaves one stale line
    // pending — the same desync an abandoned round trip leaves when its
    // reply arrives after the caller gave up waiting.
    let bridge = started_bridge(DOUBLE_REPLY_WORKER).await;

    bridge.discard_stale_reply(Duration::from_secs(2)).await;

    // The next call is request 2; without the drain it would read the
    // handshake's leftover `seq: 1` line instead of its own reply.
    let result = bridge
        .call("tools/list", &json!({}))
        .await
        .expect("call must succeed");
    assert_eq!(result["seq"], json!(2));

    bridge.stop().await;
}

#[tokio::test]
async fn calls_after_stop_fail_fast() {
    let bridge = started_bridge(ECHO_WORKER).await;
    bridge.stop().await;

    let err = bridge
        .call("tools/list", &json!({}))
        .await
        .expect_err("stopped bridge must refuse calls");
    assert!(matches!(err, AppError::NotHealthy(_)));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let bridge = started_bridge(ECHO_WORKER).await;
    bridge.stop().await;
    bridge.stop().await;
}

#[tokio::test]
async fn spawn_failure_surfaces_as_launch_error() {
    let worker = WorkerConfig {
        command: "/nonexistent-binary-for-this-test".to_owned(),
        args: Vec::new(),
        ..WorkerConfig::default()
    };
    let config = Arc::new(Config {
        worker,
        ..Config::from_env().expect("baseline config")
    });
    let bridge = Arc::new(Bridge::new(config));

    let err = bridge.start().await.expect_err("spawn must fail");
    assert!(matches!(err, AppError::Launch(_)));
    assert!(!bridge.is_healthy());
}

#[tokio::test]
async fn worker_exit_is_detected_on_the_next_call() {
    // The stub answers only the startup handshake, so the next call hits a
    // closed stream.
    let bridge = started_bridge(ONE_SHOT_WORKER).await;

    let err = bridge
        .call("tools/list", &json!({}))
        .await
        .expect_err("call against a dead worker must fail");
    assert!(matches!(err, AppError::EndOfStream | AppError::Io(_)));

    bridge.stop().await;
}
