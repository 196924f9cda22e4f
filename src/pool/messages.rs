// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/pool/messages.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file constructs the Stratum v1 messages SoloMiner sends: subscribe,
// authorize, submit, suggest_difficulty, and the client.get_version reply.
// Each message is one JSON object on one newline-terminated line.
//
// Tree Location:
// - src/pool/messages.rs (stratum protocol message builders)
// - Depends on: serde_json

use serde_json::{Value, json};

/// Client identifier sent in mining.subscribe and client.get_version replies
pub const AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Purpose tag recorded for every request id we send, so the response
/// handler can recover what a bare `{"id":N,"result":...}` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPurpose {
    Subscribe,
    Authorize,
    Submit,
    SuggestDifficulty,
    Keepalive,
}

/// Constructs messages for the Stratum v1 protocol
pub struct StratumProtocol;

impl StratumProtocol {
    pub fn subscribe_request(id: u64) -> Value {
        json!({
            "id": id,
            "method": "mining.subscribe",
            "params": [AGENT],
        })
    }

    /// Authorize as `<address>.<worker>`; the password is the literal "x".
    pub fn authorize_request(id: u64, worker: &str) -> Value {
        json!({
            "id": id,
            "method": "mining.authorize",
            "params": [worker, "x"],
        })
    }

    pub fn submit_request(
        id: u64,
        worker: &str,
        job_id: &str,
        extranonce2: &str,
        n_time: &str,
        nonce: &str,
    ) -> Value {
        json!({
            "id": id,
            "method": "mining.submit",
            "params": [worker, job_id, extranonce2, n_time, nonce],
        })
    }

    pub fn suggest_difficulty_request(id: u64, difficulty: f64) -> Value {
        json!({
            "id": id,
            "method": "mining.suggest_difficulty",
            "params": [difficulty],
        })
    }

    /// Reply to a server-initiated client.get_version, echoing its id.
    pub fn version_reply(id: &Value) -> Value {
        json!({
            "id": id,
            "result": AGENT,
            "error": null,
        })
    }

    /// Frame a JSON message as a newline-terminated wire line
    pub fn to_line(message: &Value) -> String {
        format!("{}\n", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let msg = StratumProtocol::subscribe_request(1);
        assert_eq!(msg["method"], "mining.subscribe");
        assert_eq!(msg["id"], 1);
        assert_eq!(msg["params"][0], AGENT);
    }

    #[test]
    fn test_authorize_uses_literal_x_password() {
        let msg = StratumProtocol::authorize_request(2, "bc1qabc.worker1");
        assert_eq!(msg["params"][0], "bc1qabc.worker1");
        assert_eq!(msg["params"][1], "x");
    }

    #[test]
    fn test_submit_request_param_order() {
        let msg = StratumProtocol::submit_request(7, "w", "job9", "00ff00ff", "66aabbcc", "0000beef");
        let params = msg["params"].as_array().unwrap();
        assert_eq!(params.len(), 5);
        assert_eq!(params[1], "job9");
        assert_eq!(params[2], "00ff00ff");
        assert_eq!(params[3], "66aabbcc");
        assert_eq!(params[4], "0000beef");
    }

    #[test]
    fn test_version_reply_echoes_id() {
        let id = serde_json::json!(42);
        let msg = StratumProtocol::version_reply(&id);
        assert_eq!(msg["id"], 42);
        assert_eq!(msg["result"], AGENT);
        assert!(msg["error"].is_null());
    }

    #[test]
    fn test_line_framing() {
        let line = StratumProtocol::to_line(&StratumProtocol::suggest_difficulty_request(3, 0.5));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Stratum v1 message set for Bitcoin solo mining
//   (subscribe/authorize/submit/suggest_difficulty + get_version reply).
// - v1.0.0 (2025-06-30): Initial protocol message builders.
