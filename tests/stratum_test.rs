// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/stratum_test.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Protocol tests for the stratum client against a mock pool: a local TCP
// listener that scripts the server side of the session and asserts what the
// client sends.
//
// Tree Location:
// - tests/stratum_test.rs (stratum protocol tests)
// - Depends on: solominer, tokio, serde_json

use serde_json::{Value, json};
use solominer::pool::client::{StratumClient, StratumEvent};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

const TEST_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

struct MockPool {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl MockPool {
    /// Read one newline-terminated JSON object from the client
    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for client line")
            .expect("read failed");
        serde_json::from_str(&line).expect("client sent invalid JSON")
    }

    async fn send(&mut self, msg: &Value) {
        self.writer
            .write_all(format!("{}\n", msg).as_bytes())
            .await
            .expect("write failed");
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.expect("write failed");
    }
}

/// Start a client connected to a freshly-bound mock pool
async fn connected_pair() -> (StratumClient, MockPool, UnboundedReceiver<StratumEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (events_tx, events_rx) = unbounded_channel();
    let client = StratumClient::new(
        "127.0.0.1".to_string(),
        port,
        TEST_ADDRESS.to_string(),
        "rig".to_string(),
        events_tx,
    );

    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    client.connect().await;
    let stream = accept.await.unwrap();
    let (read_half, writer) = stream.into_split();
    let pool = MockPool { reader: BufReader::new(read_half), writer };
    (client, pool, events_rx)
}

/// Skip events until one matches
async fn wait_for_event(
    events: &mut UnboundedReceiver<StratumEvent>,
    pred: impl Fn(&StratumEvent) -> bool,
) -> StratumEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Drive the session through subscribe so jobs can flow
async fn subscribe_ok(client: &StratumClient, pool: &mut MockPool) -> Value {
    let sub = pool.recv().await;
    assert_eq!(sub["method"], "mining.subscribe");
    pool.send(&json!({
        "id": sub["id"],
        "result": [[["mining.notify", "abc"]], "deadbeef", 4],
        "error": null,
    }))
    .await;
    let auth = pool.recv().await;
    assert_eq!(auth["method"], "mining.authorize");
    assert_eq!(client.extranonce1().as_deref(), Some("deadbeef"));
    auth
}

fn notify_message(job_id: &str) -> Value {
    json!({
        "id": null,
        "method": "mining.notify",
        "params": [
            job_id,
            "00".repeat(32),
            "01000000010000",
            "ffffffff00",
            ["aa".repeat(32)],
            "20000000",
            "1d00ffff",
            "66aabbcc",
            true,
        ],
    })
}

#[tokio::test]
async fn test_subscribe_parses_extranonce_then_authorizes() {
    let (client, mut pool, _events) = connected_pair().await;

    let sub = pool.recv().await;
    assert_eq!(sub["method"], "mining.subscribe");
    assert!(sub["params"][0].as_str().unwrap().starts_with("solominer/"));

    pool.send(&json!({
        "id": sub["id"],
        "result": [[["mining.notify", "abc"]], "deadbeef", 4],
        "error": null,
    }))
    .await;

    // Subscribe accepted -> next send must be mining.authorize with the
    // literal "x" password
    let auth = pool.recv().await;
    assert_eq!(auth["method"], "mining.authorize");
    assert_eq!(auth["params"][0], format!("{}.rig", TEST_ADDRESS));
    assert_eq!(auth["params"][1], "x");

    assert_eq!(client.extranonce1().as_deref(), Some("deadbeef"));
    assert_eq!(client.extranonce2_size(), 4);
    client.disconnect();
}

#[tokio::test]
async fn test_two_element_subscribe_defaults_extranonce2_size() {
    let (client, mut pool, _events) = connected_pair().await;

    let sub = pool.recv().await;
    pool.send(&json!({"id": sub["id"], "result": [[], "feedface"], "error": null}))
        .await;
    let _auth = pool.recv().await;

    assert_eq!(client.extranonce1().as_deref(), Some("feedface"));
    assert_eq!(client.extranonce2_size(), 4);
    client.disconnect();
}

#[tokio::test]
async fn test_jobs_before_auth_are_processed() {
    let (client, mut pool, mut events) = connected_pair().await;
    let auth = subscribe_ok(&client, &mut pool).await;

    // Pools commonly push difficulty + job before answering authorize
    pool.send(&json!({"id": null, "method": "mining.set_difficulty", "params": [0.5]}))
        .await;
    pool.send(&notify_message("preauth-1")).await;

    let difficulty = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Difficulty(_))).await;
    match difficulty {
        StratumEvent::Difficulty(d) => assert_eq!(d, 0.5),
        _ => unreachable!(),
    }
    assert_eq!(client.current_difficulty(), 0.5);
    let job = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Job(_))).await;
    match job {
        StratumEvent::Job(job) => {
            assert_eq!(job.job_id, "preauth-1");
            assert_eq!(job.extranonce1, "deadbeef");
            assert_eq!(job.extranonce2_size, 4);
            assert!(job.clean_jobs);
        }
        _ => unreachable!(),
    }
    assert_eq!(client.jobs_before_auth(), 1);
    assert!(!client.is_authorized());

    pool.send(&json!({"id": auth["id"], "result": true, "error": null})).await;
    let authorized = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Authorized(_))).await;
    assert!(matches!(authorized, StratumEvent::Authorized(true)));
    assert!(client.is_authorized());
    client.disconnect();
}

#[tokio::test]
async fn test_auth_rejection_is_terminal_event() {
    let (client, mut pool, mut events) = connected_pair().await;
    let auth = subscribe_ok(&client, &mut pool).await;

    pool.send(&json!({"id": auth["id"], "result": false, "error": [24, "unauthorized", null]}))
        .await;
    let authorized = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Authorized(_))).await;
    assert!(matches!(authorized, StratumEvent::Authorized(false)));
    assert!(!client.is_authorized());
    client.disconnect();
}

#[tokio::test]
async fn test_submit_share_round_trip() {
    let (client, mut pool, mut events) = connected_pair().await;
    let auth = subscribe_ok(&client, &mut pool).await;
    pool.send(&json!({"id": auth["id"], "result": true, "error": null})).await;
    wait_for_event(&mut events, |e| matches!(e, StratumEvent::Authorized(true))).await;

    // Accepted share
    client.submit_share("job-7", "00ff00ff", "66aabbcc", "0000beef");
    let submit = pool.recv().await;
    assert_eq!(submit["method"], "mining.submit");
    assert_eq!(submit["params"][0], format!("{}.rig", TEST_ADDRESS));
    assert_eq!(submit["params"][1], "job-7");
    assert_eq!(submit["params"][2], "00ff00ff");
    assert_eq!(submit["params"][3], "66aabbcc");
    assert_eq!(submit["params"][4], "0000beef");

    pool.send(&json!({"id": submit["id"], "result": true, "error": null})).await;
    let result = wait_for_event(&mut events, |e| matches!(e, StratumEvent::ShareResult { .. })).await;
    match result {
        StratumEvent::ShareResult { accepted, .. } => assert!(accepted),
        _ => unreachable!(),
    }

    // Rejected share: non-null error wins regardless of result
    client.submit_share("job-7", "00ff00ff", "66aabbcc", "0000dead");
    let submit = pool.recv().await;
    pool.send(&json!({"id": submit["id"], "result": true, "error": [23, "low difficulty share", null]}))
        .await;
    let result = wait_for_event(&mut events, |e| matches!(e, StratumEvent::ShareResult { .. })).await;
    match result {
        StratumEvent::ShareResult { accepted, message } => {
            assert!(!accepted);
            assert!(message.unwrap().contains("low difficulty share"));
        }
        _ => unreachable!(),
    }
    client.disconnect();
}

#[tokio::test]
async fn test_get_version_is_answered() {
    let (client, mut pool, _events) = connected_pair().await;
    let _auth = subscribe_ok(&client, &mut pool).await;

    pool.send(&json!({"id": 99, "method": "client.get_version", "params": []}))
        .await;
    let reply = pool.recv().await;
    assert_eq!(reply["id"], 99);
    assert!(reply["result"].as_str().unwrap().starts_with("solominer/"));
    assert!(reply["error"].is_null());
    client.disconnect();
}

#[tokio::test]
async fn test_invalid_job_is_skipped() {
    let (client, mut pool, mut events) = connected_pair().await;
    let _auth = subscribe_ok(&client, &mut pool).await;

    // Fewer than 8 params: logged and dropped, previous job state untouched
    pool.send(&json!({"id": null, "method": "mining.notify", "params": ["short", "00"]}))
        .await;
    pool.send(&notify_message("good-job")).await;

    let job = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Job(_))).await;
    match job {
        StratumEvent::Job(job) => assert_eq!(job.job_id, "good-job"),
        _ => unreachable!(),
    }
    client.disconnect();
}

#[tokio::test]
async fn test_unknown_response_id_is_discarded() {
    let (client, mut pool, _events) = connected_pair().await;
    let _auth = subscribe_ok(&client, &mut pool).await;

    // A response id we never issued must not break the session
    pool.send(&json!({"id": 424242, "result": true, "error": null})).await;
    pool.send(&json!({"id": 5, "method": "client.get_version", "params": []}))
        .await;
    let reply = pool.recv().await;
    assert_eq!(reply["id"], 5);
    client.disconnect();
}

#[tokio::test]
async fn test_non_json_line_disconnects() {
    let (_client, mut pool, mut events) = connected_pair().await;

    pool.send_raw("this is not json\n").await;
    let event = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Disconnected)).await;
    assert!(matches!(event, StratumEvent::Disconnected));
}

#[tokio::test]
async fn test_reconnect_to_other_host_is_ignored() {
    let (client, mut pool, _events) = connected_pair().await;
    let _auth = subscribe_ok(&client, &mut pool).await;

    pool.send(&json!({"id": null, "method": "client.reconnect", "params": ["evil.example.com", 3333, 0]}))
        .await;
    // Still alive: the client keeps answering
    pool.send(&json!({"id": 6, "method": "client.get_version", "params": []}))
        .await;
    let reply = pool.recv().await;
    assert_eq!(reply["id"], 6);
    assert!(client.is_connected());
    client.disconnect();
}

#[tokio::test]
async fn test_reconnect_to_same_host_disconnects() {
    let (_client, mut pool, mut events) = connected_pair().await;
    let _auth = subscribe_ok(&_client, &mut pool).await;

    pool.send(&json!({"id": null, "method": "client.reconnect", "params": ["127.0.0.1", 3333, 0]}))
        .await;
    let event = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Disconnected)).await;
    assert!(matches!(event, StratumEvent::Disconnected));
}

#[tokio::test]
async fn test_set_extranonce_updates_session() {
    let (client, mut pool, mut events) = connected_pair().await;
    let _auth = subscribe_ok(&client, &mut pool).await;

    pool.send(&json!({"id": null, "method": "mining.set_extranonce", "params": ["cafebabe", 8]}))
        .await;
    pool.send(&notify_message("after-extranonce")).await;

    let job = wait_for_event(&mut events, |e| matches!(e, StratumEvent::Job(_))).await;
    match job {
        StratumEvent::Job(job) => {
            assert_eq!(job.extranonce1, "cafebabe");
            assert_eq!(job.extranonce2_size, 8);
        }
        _ => unreachable!(),
    }
    assert_eq!(client.extranonce1().as_deref(), Some("cafebabe"));
    client.disconnect();
}

// Changelog:
// - v1.3.0 (2025-07-28): Mock-pool harness; covers pre-auth jobs,
//   set_extranonce, reconnect policy, and protocol violations.
// - v1.0.0 (2025-06-30): Initial protocol tests.
