// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/miner_stats.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements engine-wide statistics for SoloMiner. Monotonic
// counters are atomics; the rate figures an observer wants to see together
// (hashrate, peak, difficulty, uptime) live under one lock so a snapshot is
// coherent. The status string has its own lock bracketing read and write.
//
// Tree Location:
// - src/miner/stats/miner_stats.rs (engine-wide statistics logic)
// - Depends on: core, config, std

use crate::config::append_log;
use crate::core::types::MinerStatus;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

struct RateState {
    hashrate: f64,
    peak_hashrate: f64,
    difficulty: f64,
    uptime_start: Option<Instant>,
}

pub struct MinerStats {
    pub shares_submitted: AtomicU64,
    pub shares_accepted: AtomicU64,
    pub shares_rejected: AtomicU64,
    pub jobs_received: AtomicU64,
    /// Maximum leading-zero-bit count ever observed on a hash
    pub best_share_bits: AtomicU32,
    status: Mutex<MinerStatus>,
    rates: Mutex<RateState>,
}

/// Coherent point-in-time view of the engine counters for observers (UI,
/// logging). Poll at ~1 Hz.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub status: MinerStatus,
    pub hashrate: f64,
    pub peak_hashrate: f64,
    pub difficulty: f64,
    pub shares_submitted: u64,
    pub shares_accepted: u64,
    pub shares_rejected: u64,
    pub jobs_received: u64,
    pub best_share_bits: u32,
    pub uptime_seconds: f64,
}

impl MinerStats {
    pub fn new() -> Self {
        Self {
            shares_submitted: AtomicU64::new(0),
            shares_accepted: AtomicU64::new(0),
            shares_rejected: AtomicU64::new(0),
            jobs_received: AtomicU64::new(0),
            best_share_bits: AtomicU32::new(0),
            status: Mutex::new(MinerStatus::Idle),
            rates: Mutex::new(RateState {
                hashrate: 0.0,
                peak_hashrate: 0.0,
                difficulty: 0.0,
                uptime_start: None,
            }),
        }
    }

    /// Zero everything for a fresh run and start the uptime clock
    pub fn reset_for_start(&self) {
        self.shares_submitted.store(0, Ordering::Relaxed);
        self.shares_accepted.store(0, Ordering::Relaxed);
        self.shares_rejected.store(0, Ordering::Relaxed);
        self.jobs_received.store(0, Ordering::Relaxed);
        self.best_share_bits.store(0, Ordering::Relaxed);
        let mut rates = self.lock_rates();
        rates.hashrate = 0.0;
        rates.peak_hashrate = 0.0;
        rates.difficulty = 0.0;
        rates.uptime_start = Some(Instant::now());
    }

    /// Clear the run-scoped figures when the engine returns to Idle
    pub fn clear_run(&self) {
        let mut rates = self.lock_rates();
        rates.hashrate = 0.0;
        rates.uptime_start = None;
    }

    fn lock_rates(&self) -> std::sync::MutexGuard<'_, RateState> {
        self.rates.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> MinerStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: MinerStatus) {
        let old = {
            let mut guard = self.status.lock().unwrap_or_else(|e| e.into_inner());
            let old = *guard;
            *guard = status;
            old
        };
        if old != status {
            info!("Engine status: {} -> {}", old, status);
            append_log(&format!("[ENGINE] Status: {} -> {}", old, status));
        }
    }

    pub fn update_hashrate(&self, hashrate: f64) {
        let mut rates = self.lock_rates();
        rates.hashrate = hashrate;
        if hashrate > rates.peak_hashrate {
            rates.peak_hashrate = hashrate;
        }
    }

    pub fn hashrate(&self) -> f64 {
        self.lock_rates().hashrate
    }

    pub fn peak_hashrate(&self) -> f64 {
        self.lock_rates().peak_hashrate
    }

    pub fn set_difficulty(&self, difficulty: f64) {
        self.lock_rates().difficulty = difficulty;
    }

    pub fn difficulty(&self) -> f64 {
        self.lock_rates().difficulty
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.lock_rates()
            .uptime_start
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let (hashrate, peak_hashrate, difficulty, uptime_seconds) = {
            let rates = self.lock_rates();
            (
                rates.hashrate,
                rates.peak_hashrate,
                rates.difficulty,
                rates.uptime_start.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0),
            )
        };
        EngineSnapshot {
            status: self.status(),
            hashrate,
            peak_hashrate,
            difficulty,
            shares_submitted: self.shares_submitted.load(Ordering::Relaxed),
            shares_accepted: self.shares_accepted.load(Ordering::Relaxed),
            shares_rejected: self.shares_rejected.load(Ordering::Relaxed),
            jobs_received: self.jobs_received.load(Ordering::Relaxed),
            best_share_bits: self.best_share_bits.load(Ordering::Relaxed),
            uptime_seconds,
        }
    }
}

impl Default for MinerStats {
    fn default() -> Self {
        Self::new()
    }
}


// Changelog:
// - v1.3.0 (2025-07-28): Snapshot carries best_share_bits and uptime; the
//   rate figures moved under one lock for coherent observer reads.
// - v1.0.0 (2025-06-30): Initial statistics tracking.
