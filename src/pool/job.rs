// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/pool/job.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file parses mining.notify parameters into the job template the
// workers mine against. A job is immutable once constructed and lives until
// the next mining.notify arrives.
//
// Tree Location:
// - src/pool/job.rs (stratum job template)
// - Depends on: serde_json, core, thiserror

use crate::core::difficulty::{U256, nbits_to_target};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("mining.notify requires at least 8 params, got {0}")]
    TooFewParams(usize),
    #[error("mining.notify param {0} has unexpected type")]
    BadParam(&'static str),
}

/// A mining job received from the pool via mining.notify, combined with the
/// session-level extranonce values from the subscribe response.
#[derive(Debug, Clone)]
pub struct StratumJob {
    pub job_id: String,
    /// Previous block hash, 64 hex chars in stratum's grouped byte order
    pub prev_hash: String,
    /// Coinbase transaction prefix (hex)
    pub coinb1: String,
    /// Coinbase transaction suffix (hex)
    pub coinb2: String,
    /// Ordered merkle branch, 32-byte hashes as hex
    pub merkle_branch: Vec<String>,
    /// Block version word (8 hex chars)
    pub version: String,
    /// Compact network target (8 hex chars)
    pub n_bits: String,
    /// Block timestamp word (8 hex chars)
    pub n_time: String,
    pub clean_jobs: bool,
    /// Session extranonce1 as assigned by the pool
    pub extranonce1: String,
    /// Bytes of extranonce2 the miner chooses per attempt
    pub extranonce2_size: usize,
}

fn param_str(params: &[Value], index: usize, name: &'static str) -> Result<String, JobError> {
    params[index]
        .as_str()
        .map(str::to_owned)
        .ok_or(JobError::BadParam(name))
}

impl StratumJob {
    /// Build a job from mining.notify params:
    /// `[job_id, prev_hash, coinb1, coinb2, merkle_branch, version, n_bits,
    ///   n_time, clean_jobs]`.
    pub fn from_notify_params(
        params: &[Value],
        extranonce1: &str,
        extranonce2_size: usize,
    ) -> Result<Self, JobError> {
        if params.len() < 8 {
            return Err(JobError::TooFewParams(params.len()));
        }

        let branch_values = params[4].as_array().ok_or(JobError::BadParam("merkle_branch"))?;
        let mut merkle_branch = Vec::with_capacity(branch_values.len());
        for value in branch_values {
            merkle_branch.push(
                value
                    .as_str()
                    .map(str::to_owned)
                    .ok_or(JobError::BadParam("merkle_branch"))?,
            );
        }

        Ok(Self {
            job_id: param_str(params, 0, "job_id")?,
            prev_hash: param_str(params, 1, "prev_hash")?,
            coinb1: param_str(params, 2, "coinb1")?,
            coinb2: param_str(params, 3, "coinb2")?,
            merkle_branch,
            version: param_str(params, 5, "version")?,
            n_bits: param_str(params, 6, "n_bits")?,
            n_time: param_str(params, 7, "n_time")?,
            clean_jobs: params.get(8).and_then(Value::as_bool).unwrap_or(false),
            extranonce1: extranonce1.to_owned(),
            extranonce2_size,
        })
    }

    /// Network block target expanded from the job's compact nBits word.
    /// Logged for observability; shares are judged against the pool's share
    /// target, never this.
    pub fn block_target(&self) -> Option<U256> {
        u32::from_str_radix(&self.n_bits, 16).ok().map(nbits_to_target)
    }
}


// Changelog:
// - v1.3.0 (2025-07-28): Job now carries the session extranonce values so a
//   worker never races a mid-session mining.set_extranonce.
// - v1.0.0 (2025-06-30): Initial mining.notify parsing.
