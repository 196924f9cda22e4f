// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/pool/client.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the Stratum v1 TCP client for communicating with the
// mining pool. It runs three tokio tasks per connection (receive loop,
// keepalive/inactivity watchdog, single-writer outbound loop) and reports
// everything the engine needs through an event channel.
//
// Protocol flow:
//     1. TCP connect (30s timeout, DNS errors surfaced separately)
//     2. mining.subscribe  -> extranonce1, extranonce2_size
//     3. mining.authorize  -> true/false (password is literal "x")
//     4. pool pushes mining.set_difficulty + mining.notify (jobs may arrive
//        before the authorize response; they are mined anyway)
//     5. mining.submit per share; responses matched by id
//
// Message routing: objects WITH a "method" field are server notifications;
// objects WITHOUT one are responses, matched against the pending-request
// table by "id".
//
// Tree Location:
// - src/pool/client.rs (stratum session logic)
// - Depends on: tokio, serde_json, core, config

use crate::config::append_log;
use crate::core::types::MinerStatus;
use crate::pool::job::StratumJob;
use crate::pool::messages::{RequestPurpose, StratumProtocol};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Send a harmless ping if nothing has been written for this long
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);
/// Declare the connection dead if nothing has been received for this long
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);
/// TCP connect timeout
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// A line must terminate within this many buffered bytes
pub const RECV_BUFFER_CAP: usize = 1024 * 1024;

/// Events pushed to the engine. Equivalent to a callback interface, but a
/// channel keeps the engine's handling on its own task.
#[derive(Debug)]
pub enum StratumEvent {
    Status(MinerStatus),
    Job(Arc<StratumJob>),
    Authorized(bool),
    Difficulty(f64),
    ShareResult { accepted: bool, message: Option<String> },
    Disconnected,
    Error(String),
}

/// Per-connection session state. One lock guards the whole record; every
/// critical section is a handful of loads/stores.
struct SessionState {
    extranonce1: Option<String>,
    extranonce2_size: usize,
    difficulty: f64,
    authorized: bool,
    connected: bool,
    /// Guarantees the disconnect event fires at most once per connection
    disconnected: bool,
    next_msg_id: u64,
    pending: HashMap<u64, RequestPurpose>,
    last_send: Instant,
    last_recv: Instant,
    jobs_before_auth: u32,
}

impl SessionState {
    fn fresh() -> Self {
        Self {
            extranonce1: None,
            extranonce2_size: 4,
            difficulty: 1.0,
            authorized: false,
            connected: false,
            disconnected: false,
            next_msg_id: 0,
            pending: HashMap::new(),
            last_send: Instant::now(),
            last_recv: Instant::now(),
            jobs_before_auth: 0,
        }
    }
}

struct ClientInner {
    host: String,
    port: u16,
    address: String,
    worker: String,
    running: AtomicBool,
    state: Mutex<SessionState>,
    outbound: Mutex<Option<UnboundedSender<String>>>,
    events: UnboundedSender<StratumEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Stratum v1 client. Clones share the same session.
#[derive(Clone)]
pub struct StratumClient {
    inner: Arc<ClientInner>,
}

impl StratumClient {
    pub fn new(
        host: String,
        port: u16,
        address: String,
        worker: String,
        events: UnboundedSender<StratumEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                host,
                port,
                address,
                worker,
                running: AtomicBool::new(false),
                state: Mutex::new(SessionState::fresh()),
                outbound: Mutex::new(None),
                events,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock_state().connected
    }

    pub fn is_authorized(&self) -> bool {
        self.lock_state().authorized
    }

    pub fn extranonce1(&self) -> Option<String> {
        self.lock_state().extranonce1.clone()
    }

    pub fn extranonce2_size(&self) -> usize {
        self.lock_state().extranonce2_size
    }

    pub fn current_difficulty(&self) -> f64 {
        self.lock_state().difficulty
    }

    pub fn jobs_before_auth(&self) -> u32 {
        self.lock_state().jobs_before_auth
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        // The state mutex only guards plain data; a poisoned lock would mean
        // a panic mid-assignment, which none of the critical sections can do
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, msg: &str) {
        info!("{}", msg);
        append_log(&format!("[STRATUM] {}", msg));
    }

    fn log_error(&self, msg: &str) {
        error!("{}", msg);
        append_log(&format!("[STRATUM ERROR] {}", msg));
    }

    fn emit(&self, event: StratumEvent) {
        let _ = self.inner.events.send(event);
    }

    fn set_status(&self, status: MinerStatus) {
        self.log(&format!("Status -> {}", status));
        self.emit(StratumEvent::Status(status));
    }

    /// Connect to the pool and start the session tasks. Failures are
    /// surfaced as status + error events; the engine decides what to do.
    pub async fn connect(&self) {
        *self.lock_state() = SessionState::fresh();

        self.log(&format!("Connecting to {}:{}...", self.inner.host, self.inner.port));
        self.set_status(MinerStatus::Connecting);

        let addr = match tokio::net::lookup_host((self.inner.host.as_str(), self.inner.port)).await
        {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    self.log_error(&format!("DNS resolution returned no addresses for {}", self.inner.host));
                    self.set_status(MinerStatus::DnsFailed);
                    self.emit(StratumEvent::Error("DNS resolution failed".to_string()));
                    return;
                }
            },
            Err(e) => {
                self.log_error(&format!("DNS resolution failed for {}: {}", self.inner.host, e));
                self.set_status(MinerStatus::DnsFailed);
                self.emit(StratumEvent::Error(format!("DNS resolution failed: {}", e)));
                return;
            }
        };
        self.log(&format!("Resolved {} -> {}", self.inner.host, addr.ip()));

        let stream = match tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr)).await
        {
            Err(_) => {
                self.log_error(&format!("Connection timed out to {}:{}", self.inner.host, self.inner.port));
                self.set_status(MinerStatus::Timeout);
                self.emit(StratumEvent::Error("Connection timed out".to_string()));
                return;
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                self.log_error(&format!("Connection refused by {}:{}", self.inner.host, self.inner.port));
                self.set_status(MinerStatus::Refused);
                self.emit(StratumEvent::Error("Connection refused".to_string()));
                return;
            }
            Ok(Err(e)) => {
                self.log_error(&format!("Connection failed: {}", e));
                self.set_status(MinerStatus::Error);
                self.emit(StratumEvent::Error(format!("Connection failed: {}", e)));
                return;
            }
            Ok(Ok(stream)) => stream,
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to disable Nagle: {}", e);
        }

        self.inner.running.store(true, Ordering::SeqCst);
        {
            let mut state = self.lock_state();
            state.connected = true;
            state.last_send = Instant::now();
            state.last_recv = Instant::now();
        }

        self.log(&format!("TCP connected to {}:{}", self.inner.host, self.inner.port));
        self.set_status(MinerStatus::Connected);

        let (read_half, write_half) = stream.into_split();
        let (tx_out, rx_out) = unbounded_channel();
        *self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx_out);

        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(tokio::spawn(writer_loop(self.clone(), rx_out, write_half)));
        tasks.push(tokio::spawn(recv_loop(self.clone(), read_half)));
        tasks.push(tokio::spawn(keepalive_loop(self.clone())));
        drop(tasks);

        self.set_status(MinerStatus::Subscribing);
        let id = self.send_request(RequestPurpose::Subscribe, |id| {
            StratumProtocol::subscribe_request(id)
        });
        self.log(&format!(">> mining.subscribe (id={})", id));
    }

    /// Clean shutdown requested by the engine. Does not emit Disconnected,
    /// so the engine's reconnect path stays idle.
    pub fn disconnect(&self) {
        self.log("Disconnecting...");
        self.inner.running.store(false, Ordering::SeqCst);
        {
            let mut state = self.lock_state();
            state.disconnected = true;
            state.connected = false;
            state.authorized = false;
        }
        *self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);
        self.set_status(MinerStatus::Disconnected);
        self.log("Disconnected");
    }

    fn worker_string(&self) -> String {
        if self.inner.address.is_empty() {
            self.inner.worker.clone()
        } else {
            format!("{}.{}", self.inner.address, self.inner.worker)
        }
    }

    /// Submit a share. Safe to call from any thread; the line goes through
    /// the single-writer channel.
    pub fn submit_share(&self, job_id: &str, extranonce2: &str, n_time: &str, nonce: &str) {
        let worker = self.worker_string();
        let id = self.send_request(RequestPurpose::Submit, |id| {
            StratumProtocol::submit_request(id, &worker, job_id, extranonce2, n_time, nonce)
        });
        self.log(&format!(
            ">> mining.submit (id={}): job={}, en2={}, nonce={}",
            id, job_id, extranonce2, nonce
        ));
    }

    /// Ask the pool to set our share difficulty. Called by the engine right
    /// after authorization and once more after measuring the hashrate.
    pub fn suggest_difficulty(&self, difficulty: f64) {
        let id = self.send_request(RequestPurpose::SuggestDifficulty, |id| {
            StratumProtocol::suggest_difficulty_request(id, difficulty)
        });
        self.log(&format!(">> mining.suggest_difficulty({}) (id={})", difficulty, id));
    }

    fn send_request(&self, purpose: RequestPurpose, build: impl FnOnce(u64) -> Value) -> u64 {
        let id = {
            let mut state = self.lock_state();
            state.next_msg_id += 1;
            let id = state.next_msg_id;
            state.pending.insert(id, purpose);
            id
        };
        self.send_line(StratumProtocol::to_line(&build(id)));
        id
    }

    fn send_line(&self, line: String) {
        let outbound = self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner());
        match outbound.as_ref() {
            Some(tx) => {
                let _ = tx.send(line);
            }
            None => self.log_error("Cannot send: not connected"),
        }
    }

    /// Connection-loss path. Fires the Disconnected event at most once per
    /// connection, guarded by the `disconnected` flag.
    fn handle_disconnect(&self) {
        let was_connected = {
            let mut state = self.lock_state();
            if state.disconnected {
                return;
            }
            state.disconnected = true;
            let was = state.connected;
            state.connected = false;
            state.authorized = false;
            was
        };
        self.inner.running.store(false, Ordering::SeqCst);
        // Drop the writer's channel so the writer loop drains out
        *self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
        if was_connected {
            self.log("Connection lost");
            self.set_status(MinerStatus::Disconnected);
        }
        self.emit(StratumEvent::Disconnected);
    }

    fn handle_message(&self, msg: Value) {
        if msg.get("method").is_some() {
            self.handle_server_method(&msg);
        } else if msg.get("id").is_some() {
            self.handle_response(&msg);
        } else {
            self.log_error(&format!("Unknown message format: {:.200}", msg.to_string()));
        }
    }

    fn handle_server_method(&self, msg: &Value) {
        let method = msg.get("method").and_then(Value::as_str).unwrap_or("");
        let empty = Vec::new();
        let params = msg.get("params").and_then(Value::as_array).unwrap_or(&empty);

        match method {
            "mining.notify" => self.handle_notify(params),
            "mining.set_difficulty" => {
                if let Some(diff) = params.first().and_then(Value::as_f64) {
                    let old = {
                        let mut state = self.lock_state();
                        let old = state.difficulty;
                        state.difficulty = diff;
                        old
                    };
                    self.log(&format!("<< mining.set_difficulty: {} -> {}", old, diff));
                    self.emit(StratumEvent::Difficulty(diff));
                }
            }
            "mining.set_extranonce" => {
                if params.len() >= 2 {
                    let new_en1 = params[0].as_str().unwrap_or("").to_string();
                    let new_size = params[1].as_u64().unwrap_or(4) as usize;
                    let old_en1 = {
                        let mut state = self.lock_state();
                        let old = state.extranonce1.take();
                        state.extranonce1 = Some(new_en1.clone());
                        state.extranonce2_size = new_size;
                        old
                    };
                    self.log(&format!(
                        "<< mining.set_extranonce: en1={:?}->{}, en2_size={}",
                        old_en1, new_en1, new_size
                    ));
                }
            }
            "client.get_version" => {
                if let Some(id) = msg.get("id") {
                    self.send_line(StratumProtocol::to_line(&StratumProtocol::version_reply(id)));
                    self.log("<< client.get_version -> responded");
                }
            }
            "client.show_message" => {
                let text = params.first().and_then(Value::as_str).unwrap_or("");
                self.log(&format!("<< Pool message: {}", text));
            }
            "client.reconnect" => {
                let host = params.first().and_then(Value::as_str);
                self.log(&format!("<< client.reconnect: host={:?}", host));
                match host {
                    // A hostile pool must not redirect us to a different host
                    Some(h) if h != self.inner.host => {
                        self.log("   Ignoring reconnect to different host (security)");
                    }
                    _ => {
                        self.log("   Will reconnect via disconnect handler");
                        self.handle_disconnect();
                    }
                }
            }
            other => {
                self.log(&format!("<< Unknown server method: {} params={:?}", other, params));
            }
        }
    }

    fn handle_notify(&self, params: &[Value]) {
        let job_id = params.first().and_then(Value::as_str).unwrap_or("?");
        let branches = params.get(4).and_then(Value::as_array).map_or(0, Vec::len);
        self.log(&format!("<< mining.notify: job={}, branches={}", job_id, branches));

        let (extranonce1, extranonce2_size, authorized) = {
            let state = self.lock_state();
            (state.extranonce1.clone(), state.extranonce2_size, state.authorized)
        };

        let Some(extranonce1) = extranonce1 else {
            self.log_error(
                "Received mining.notify but extranonce1 not set yet - subscribe may have failed",
            );
            return;
        };

        match StratumJob::from_notify_params(params, &extranonce1, extranonce2_size) {
            Ok(job) => {
                if !authorized {
                    let count = {
                        let mut state = self.lock_state();
                        state.jobs_before_auth += 1;
                        state.jobs_before_auth
                    };
                    self.log(&format!(
                        "   Job received before auth (#{}) - processing anyway",
                        count
                    ));
                }
                if let Some(target) = job.block_target() {
                    debug!("Job {} network block target: {:#066x}", job.job_id, target);
                }
                self.emit(StratumEvent::Job(Arc::new(job)));
            }
            Err(e) => {
                // Invalid job: log and stay on the previous one
                self.log_error(&format!("Failed to parse job: {}", e));
            }
        }
    }

    fn handle_response(&self, msg: &Value) {
        let Some(id) = msg.get("id").and_then(Value::as_u64) else {
            debug!("Response with non-numeric id: {:.200}", msg.to_string());
            return;
        };
        let result = msg.get("result");
        let error = msg.get("error").filter(|e| !e.is_null());

        let purpose = self.lock_state().pending.remove(&id);

        match purpose {
            None => {
                // Late response or an id we never issued
                debug!("Response for unknown id={}: result={:?}, error={:?}", id, result, error);
            }
            Some(RequestPurpose::Subscribe) => self.handle_subscribe_response(id, result, error),
            Some(RequestPurpose::Authorize) => self.handle_authorize_response(id, result, error),
            Some(RequestPurpose::Submit) => self.handle_submit_response(id, result, error),
            Some(RequestPurpose::SuggestDifficulty) => match error {
                Some(e) => debug!(
                    "suggest_difficulty response (id={}): error={} (pool may not support this)",
                    id, e
                ),
                None => debug!("suggest_difficulty accepted (id={})", id),
            },
            Some(RequestPurpose::Keepalive) => debug!("Keepalive pong (id={})", id),
        }
    }

    fn handle_subscribe_response(&self, id: u64, result: Option<&Value>, error: Option<&Value>) {
        if let Some(e) = error {
            self.log_error(&format!("Subscribe FAILED: {}", e));
            self.set_status(MinerStatus::SubscribeFailed);
            self.emit(StratumEvent::Error(format!("Subscribe error: {}", e)));
            return;
        }

        // Standard shape: [ [subscriptions...], extranonce1, extranonce2_size ]
        // Some pools omit the size; default it to 4. An unusable extranonce1
        // is fatal for the session.
        let Some(fields) = result.and_then(Value::as_array) else {
            self.log_error(&format!("Subscribe response has unexpected format: {:?}", result));
            self.set_status(MinerStatus::SubscribeFailed);
            self.emit(StratumEvent::Error("Bad subscribe response".to_string()));
            return;
        };

        let (extranonce1, extranonce2_size) = if fields.len() >= 3 {
            (
                fields[1].as_str().unwrap_or("").to_string(),
                fields[2].as_u64().unwrap_or(4) as usize,
            )
        } else if fields.len() == 2 {
            self.log("Subscribe response has only 2 fields (using default extranonce2_size=4)");
            (fields[1].as_str().unwrap_or("").to_string(), 4)
        } else {
            self.log_error(&format!("Subscribe result too short ({} fields)", fields.len()));
            self.set_status(MinerStatus::SubscribeFailed);
            return;
        };

        if extranonce1.is_empty() {
            self.log_error("Subscribe returned empty extranonce1!");
            self.set_status(MinerStatus::SubscribeFailed);
            return;
        }

        {
            let mut state = self.lock_state();
            state.extranonce1 = Some(extranonce1.clone());
            state.extranonce2_size = extranonce2_size;
        }
        self.log(&format!(
            "<< Subscribe OK (id={}): extranonce1={}, extranonce2_size={}",
            id, extranonce1, extranonce2_size
        ));
        self.set_status(MinerStatus::Subscribed);

        let worker = self.worker_string();
        let auth_id = self.send_request(RequestPurpose::Authorize, |id| {
            StratumProtocol::authorize_request(id, &worker)
        });
        self.log(&format!(">> mining.authorize (id={}) as '{}'", auth_id, worker));
        self.set_status(MinerStatus::Authorizing);
    }

    fn handle_authorize_response(&self, id: u64, result: Option<&Value>, error: Option<&Value>) {
        if let Some(e) = error {
            self.log_error(&format!("Authorization FAILED (id={}): {}", id, e));
            self.lock_state().authorized = false;
            self.set_status(MinerStatus::AuthFailed);
            self.emit(StratumEvent::Authorized(false));
            return;
        }

        let authorized = result.map(value_is_truthy).unwrap_or(false);
        self.lock_state().authorized = authorized;
        if authorized {
            self.log("Authorization SUCCESSFUL");
            self.set_status(MinerStatus::Authorized);
        } else {
            self.log_error(&format!("Authorization denied: result={:?}", result));
            self.set_status(MinerStatus::AuthFailed);
        }
        self.emit(StratumEvent::Authorized(authorized));
    }

    fn handle_submit_response(&self, id: u64, result: Option<&Value>, error: Option<&Value>) {
        // A non-null error is a rejection regardless of the result field
        let accepted = result.map(value_is_truthy).unwrap_or(false) && error.is_none();
        let message = error.map(|e| match e.as_array() {
            Some(arr) if arr.len() >= 2 => arr[1].to_string(),
            _ => e.to_string(),
        });

        if accepted {
            self.log(&format!("<< Share ACCEPTED (id={})", id));
        } else {
            self.log(&format!(
                "<< Share REJECTED (id={}): {}",
                id,
                message.as_deref().unwrap_or("unknown reason")
            ));
        }
        self.emit(StratumEvent::ShareResult { accepted, message });
    }
}

/// Python-style truthiness for stratum result fields: pools answer with
/// true/false, null, or occasionally a status object.
fn value_is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Single writer: every outbound line funnels through here in order.
async fn writer_loop(
    client: StratumClient,
    mut rx: UnboundedReceiver<String>,
    mut write_half: OwnedWriteHalf,
) {
    while let Some(line) = rx.recv().await {
        debug!("SEND: {}", line.trim_end());
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            client.log_error(&format!("Send error: {}", e));
            client.handle_disconnect();
            return;
        }
        client.lock_state().last_send = Instant::now();
    }
}

/// Receive loop: reassembles newline-delimited JSON, processing every
/// complete line in arrival order. Multiple objects per TCP read are normal.
async fn recv_loop(client: StratumClient, mut read_half: OwnedReadHalf) {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    client.log("Receiver task started");

    while client.inner.running.load(Ordering::SeqCst) {
        match read_half.read(&mut chunk).await {
            Ok(0) => {
                client.log_error("Connection closed by pool (empty recv)");
                client.handle_disconnect();
                return;
            }
            Ok(n) => {
                client.lock_state().last_recv = Instant::now();
                buf.extend_from_slice(&chunk[..n]);

                if buf.len() > RECV_BUFFER_CAP {
                    client.log_error("Receive buffer overflow (>1MiB without newline)");
                    client.handle_disconnect();
                    return;
                }

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes[..pos]);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("RECV: {:.500}", line);
                    match serde_json::from_str::<Value>(line) {
                        Ok(msg) => client.handle_message(msg),
                        Err(e) => {
                            // Protocol violation: the peer is not speaking
                            // line-delimited JSON
                            client.log_error(&format!("JSON parse error: {} | line: {:.200}", e, line));
                            client.handle_disconnect();
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                if client.inner.running.load(Ordering::SeqCst) {
                    client.log_error(&format!("Socket error: {}", e));
                    client.handle_disconnect();
                }
                return;
            }
        }
    }
    client.log("Receiver task stopped");
}

/// Keepalive + inactivity watchdog, woken every 5 seconds.
///
/// The ping is mining.suggest_difficulty with the current difficulty - a
/// harmless no-op. It must NEVER be mining.subscribe: that would request a
/// fresh extranonce1 mid-session and corrupt every in-flight job.
async fn keepalive_loop(client: StratumClient) {
    client.log("Keepalive task started");
    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;
        if !client.inner.running.load(Ordering::SeqCst) {
            return;
        }

        let (idle_send, idle_recv, difficulty) = {
            let state = client.lock_state();
            (state.last_send.elapsed(), state.last_recv.elapsed(), state.difficulty)
        };

        if idle_send > KEEPALIVE_INTERVAL {
            client.log("Sending keepalive (suggest_difficulty)...");
            client.send_request(RequestPurpose::Keepalive, |id| {
                StratumProtocol::suggest_difficulty_request(id, difficulty)
            });
        }

        if idle_recv > INACTIVITY_TIMEOUT {
            client.log_error(&format!(
                "Pool inactivity timeout ({}s with no data)",
                INACTIVITY_TIMEOUT.as_secs()
            ));
            client.handle_disconnect();
            return;
        }
    }
}


// Changelog:
// - v1.3.0 (2025-07-28): Non-JSON lines now disconnect instead of being
//   skipped; the receive buffer cap applies before line splitting.
// - v1.2.0 (2025-07-12): Keepalive switched from re-subscribe to
//   suggest_difficulty after a pool reset extranonce1 mid-session; added the
//   inactivity watchdog and client.reconnect host check.
// - v1.0.0 (2025-06-30): Initial stratum v1 session handling.
