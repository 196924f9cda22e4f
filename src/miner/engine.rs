// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/engine.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the mining engine: it owns the stratum client, the
// search kernel, and the worker threads, and binds them together. Stratum
// events arrive on a channel and are handled on one tokio task; workers are
// OS threads that block on the job slot and the kernel.
//
// Task architecture:
//     - stratum recv / keepalive / writer tasks (pool module)
//     - engine event-loop task (this file)
//     - N mining worker threads (worker.rs): N = 1 for GPU, cores - 1 for CPU
//     - observers poll EngineSnapshot at ~1 Hz
//
// Tree Location:
// - src/miner/engine.rs (engine orchestration)
// - Depends on: core, pool, kernel, stats, worker, config, tokio, rand

use crate::config::{self, SessionRecord, append_log};
use crate::core::difficulty::optimal_difficulty;
use crate::core::types::{MinerStatus, PerformanceMode, Share};
use crate::miner::kernel::{SearchKernel, create_kernel};
use crate::miner::stats::{EngineSnapshot, MinerStats};
use crate::miner::worker::mining_loop;
use crate::pool::client::{StratumClient, StratumEvent};
use crate::pool::job::StratumJob;
use chrono::Local;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, info};

/// Nonces per GPU dispatch: large enough to amortise dispatch overhead
pub const GPU_BATCH_SIZE: u32 = 1 << 22;
/// Nonces per CPU batch: small enough to notice a job change quickly
pub const CPU_BATCH_SIZE: u32 = 1 << 16;
/// How often cumulative hash totals are flushed to the stats file
pub const STATS_PERSIST_INTERVAL: Duration = Duration::from_secs(30);
/// Aim for ~1 share per this interval when suggesting difficulty
pub const TARGET_SHARE_INTERVAL: Duration = Duration::from_secs(20);
/// Suggested right after authorize, before the hashrate is known
pub const INITIAL_SUGGEST_DIFFICULTY: f64 = 0.5;
/// Mining time before the measured-hashrate suggestion is computed
pub const HASHRATE_MEASUREMENT_PERIOD: Duration = Duration::from_secs(15);
/// Reconnect delay is RECONNECT_BASE plus up to RECONNECT_JITTER of jitter
pub const RECONNECT_BASE: Duration = Duration::from_secs(5);
pub const RECONNECT_JITTER: Duration = Duration::from_secs(5);
/// Bound on joining each worker thread during stop
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bitcoin address is required to start mining")]
    MissingAddress,
    #[error("invalid bitcoin address: {0}")]
    InvalidAddress(String),
}

#[derive(Clone)]
struct ReconnectParams {
    host: String,
    port: u16,
    address: String,
    worker: String,
    network: String,
}

/// State shared between the engine API, its event-loop task, and the worker
/// threads.
pub(crate) struct EngineShared {
    running: AtomicBool,
    reconnect_enabled: AtomicBool,
    pub(crate) stats: MinerStats,
    kernel: Mutex<Option<Arc<dyn SearchKernel>>>,
    job_slot: Mutex<Option<Arc<StratumJob>>>,
    job_cv: Condvar,
    client: Mutex<Option<StratumClient>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    reconnect_params: Mutex<Option<ReconnectParams>>,
    performance_mode: Mutex<PerformanceMode>,
    gpu_threads: AtomicUsize,
    cpu_threads: AtomicUsize,
    initial_diff_suggested: AtomicBool,
    measured_diff_suggested: AtomicBool,
    diff_suggest_time: Mutex<Option<Instant>>,
    hashes_since_persist: AtomicU64,
    events_tx: Mutex<Option<UnboundedSender<StratumEvent>>>,
    session_start: Mutex<Option<String>>,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            reconnect_enabled: AtomicBool::new(false),
            stats: MinerStats::new(),
            kernel: Mutex::new(None),
            job_slot: Mutex::new(None),
            job_cv: Condvar::new(),
            client: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            reconnect_params: Mutex::new(None),
            performance_mode: Mutex::new(PerformanceMode::FullSpeed),
            gpu_threads: AtomicUsize::new(0),
            cpu_threads: AtomicUsize::new(0),
            initial_diff_suggested: AtomicBool::new(false),
            measured_diff_suggested: AtomicBool::new(false),
            diff_suggest_time: Mutex::new(None),
            hashes_since_persist: AtomicU64::new(0),
            events_tx: Mutex::new(None),
            session_start: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn kernel(&self) -> Option<Arc<dyn SearchKernel>> {
        lock(&self.kernel).clone()
    }

    pub(crate) fn current_job(&self) -> Option<Arc<StratumJob>> {
        lock(&self.job_slot).clone()
    }

    /// Block (bounded) until a job may be available; workers re-check the
    /// running flag after every wakeup.
    pub(crate) fn wait_for_job(&self, timeout: Duration) {
        let guard = lock(&self.job_slot);
        if guard.is_none() {
            let _ = self.job_cv.wait_timeout(guard, timeout);
        }
    }

    pub(crate) fn performance_mode(&self) -> PerformanceMode {
        *lock(&self.performance_mode)
    }

    pub(crate) fn submit_share(&self, share: &Share) {
        let client = lock(&self.client).clone();
        match client {
            Some(client) => {
                client.submit_share(&share.job_id, &share.extranonce2, &share.n_time, &share.nonce)
            }
            None => error!("Share found but no pool connection to submit it"),
        }
    }

    pub(crate) fn record_hashes(&self, hashes: u64) {
        self.hashes_since_persist.fetch_add(hashes, Ordering::Relaxed);
    }

    /// Flush accumulated hashes into the cumulative stats file
    pub(crate) fn persist_hashes(&self) {
        let hashes = self.hashes_since_persist.swap(0, Ordering::Relaxed);
        if hashes == 0 {
            return;
        }
        let mut stats = config::load_stats();
        stats.total_hashes += hashes;
        if let Err(e) = config::save_stats(&stats) {
            append_log(&format!("[ENGINE ERROR] Failed to persist stats: {}", e));
        }
    }

    /// One-shot: after HASHRATE_MEASUREMENT_PERIOD of mining, suggest the
    /// difficulty matching the measured hashrate. The pool may ignore it
    /// and adjust on its own thereafter.
    pub(crate) fn maybe_suggest_measured_difficulty(&self, hashrate: f64) {
        if self.measured_diff_suggested.load(Ordering::Relaxed) || hashrate <= 0.0 {
            return;
        }
        let elapsed = match *lock(&self.diff_suggest_time) {
            Some(t0) => t0.elapsed(),
            None => return,
        };
        if elapsed < HASHRATE_MEASUREMENT_PERIOD {
            return;
        }
        if self.measured_diff_suggested.swap(true, Ordering::Relaxed) {
            return;
        }

        let difficulty = optimal_difficulty(hashrate, TARGET_SHARE_INTERVAL.as_secs_f64());
        append_log(&format!(
            "[ENGINE] Measured hashrate: {:.1} MH/s -> optimal difficulty: {} (target: ~1 share per {}s)",
            hashrate / 1e6,
            difficulty,
            TARGET_SHARE_INTERVAL.as_secs()
        ));
        info!(
            "📐 Measured {:.1} MH/s, suggesting difficulty {}",
            hashrate / 1e6,
            difficulty
        );
        if let Some(client) = lock(&self.client).clone() {
            if client.is_connected() {
                client.suggest_difficulty(difficulty);
            }
        }
    }

    /// Stratum connection-stage statuses flow through here. Once mining,
    /// earlier-stage statuses must not regress the display.
    fn apply_stratum_status(&self, status: MinerStatus) {
        if self.stats.status() == MinerStatus::Mining && status.is_pre_mining_stage() {
            return;
        }
        self.stats.set_status(status);
    }

    fn on_job(self: &Arc<Self>, job: Arc<StratumJob>) {
        let old_job_id = {
            let mut slot = lock(&self.job_slot);
            let old = slot.as_ref().map(|j| j.job_id.clone());
            *slot = Some(job.clone());
            old
        };
        self.job_cv.notify_all();

        let job_num = self.stats.jobs_received.fetch_add(1, Ordering::Relaxed) + 1;
        match old_job_id {
            Some(old) => append_log(&format!(
                "[ENGINE] Job #{}: {} -> {} (clean={})",
                job_num, old, job.job_id, job.clean_jobs
            )),
            None => append_log(&format!("[ENGINE] First job: {}", job.job_id)),
        }
        info!("📋 Job #{}: {} (clean={})", job_num, job.job_id, job.clean_jobs);

        self.stats.set_status(MinerStatus::Mining);
        self.spawn_workers_if_needed();
    }

    fn spawn_workers_if_needed(self: &Arc<Self>) {
        let mut workers = lock(&self.workers);
        workers.retain(|handle| !handle.is_finished());
        if !workers.is_empty() {
            return;
        }
        let Some(kernel) = self.kernel() else {
            error!("Job arrived but no search kernel is initialized");
            return;
        };

        let count = planned_worker_count(
            kernel.is_gpu(),
            self.gpu_threads.load(Ordering::Relaxed),
            self.cpu_threads.load(Ordering::Relaxed),
            num_cpus::get(),
        );

        for index in 0..count {
            let shared = Arc::clone(self);
            let builder = thread::Builder::new().name(format!("mining-loop-{}", index));
            match builder.spawn(move || mining_loop(shared, index, count)) {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to spawn mining thread {}: {}", index, e),
            }
        }
        append_log(&format!("[ENGINE] Started {} mining thread(s)", workers.len()));
        info!("⛏️ Started {} mining thread(s)", workers.len());
    }

    fn on_authorized(&self, success: bool) {
        if success {
            append_log("[ENGINE] Pool authorized - waiting for first job");
            // Suggest a safe initial difficulty right away; the measured
            // suggestion follows once the hashrate is known
            if !self.initial_diff_suggested.swap(true, Ordering::Relaxed) {
                if let Some(client) = lock(&self.client).clone() {
                    client.suggest_difficulty(INITIAL_SUGGEST_DIFFICULTY);
                }
                *lock(&self.diff_suggest_time) = Some(Instant::now());
                append_log(&format!(
                    "[ENGINE] Suggested initial difficulty: {}",
                    INITIAL_SUGGEST_DIFFICULTY
                ));
            }
        } else {
            append_log("[ENGINE ERROR] Pool authorization FAILED");
            error!("❌ Pool authorization failed");
        }
    }

    fn on_difficulty(&self, difficulty: f64) {
        let old = self.stats.difficulty();
        self.stats.set_difficulty(difficulty);
        if old != difficulty {
            append_log(&format!("[ENGINE] Pool difficulty: {} -> {}", old, difficulty));
            info!("🔧 Pool difficulty: {} -> {}", old, difficulty);
        }
    }

    fn on_share_result(&self, accepted: bool, message: Option<String>) {
        if accepted {
            let total = self.stats.shares_accepted.fetch_add(1, Ordering::Relaxed) + 1;
            let submitted = self.stats.shares_submitted.load(Ordering::Relaxed);
            append_log(&format!("[ENGINE] Share ACCEPTED ({}/{})", total, submitted));
            info!("✅ Share accepted ({}/{})", total, submitted);
        } else {
            let total = self.stats.shares_rejected.fetch_add(1, Ordering::Relaxed) + 1;
            append_log(&format!(
                "[ENGINE] Share REJECTED: {} ({} rejected)",
                message.as_deref().unwrap_or("unknown"),
                total
            ));
            info!("❌ Share rejected: {}", message.as_deref().unwrap_or("unknown"));
        }
    }

    fn on_disconnect(self: &Arc<Self>) {
        append_log("[ENGINE] Disconnected from pool");

        let params = lock(&self.reconnect_params).clone();
        if self.is_running() && self.reconnect_enabled.load(Ordering::SeqCst) && params.is_some() {
            let delay_secs = RECONNECT_BASE.as_secs_f64()
                + rand::thread_rng().gen_range(0.0..RECONNECT_JITTER.as_secs_f64());
            append_log(&format!("[ENGINE] Reconnecting in {:.1}s...", delay_secs));
            info!("🔄 Reconnecting in {:.1}s...", delay_secs);
            self.stats.set_status(MinerStatus::Reconnecting);

            let shared = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs_f64(delay_secs)).await;
                shared.reconnect().await;
            });
        } else {
            self.stats.set_status(MinerStatus::Disconnected);
        }
    }

    async fn reconnect(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        let Some(params) = lock(&self.reconnect_params).clone() else {
            return;
        };
        append_log(&format!("[ENGINE] Reconnecting to {}:{}...", params.host, params.port));
        self.stats.set_status(MinerStatus::Reconnecting);

        // Clear the job so workers block until the new session delivers one
        *lock(&self.job_slot) = None;

        if let Some(old) = lock(&self.client).take() {
            old.disconnect();
        }
        self.connect_stratum(&params).await;
    }

    async fn connect_stratum(self: &Arc<Self>, params: &ReconnectParams) {
        let Some(events_tx) = lock(&self.events_tx).clone() else {
            return;
        };
        let client = StratumClient::new(
            params.host.clone(),
            params.port,
            params.address.clone(),
            params.worker.clone(),
            events_tx,
        );
        *lock(&self.client) = Some(client.clone());
        client.connect().await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Worker thread count: the GPU parallelises internally so one dispatch
/// thread suffices; CPU mining leaves a core for the stratum tasks.
fn planned_worker_count(is_gpu: bool, gpu_config: usize, cpu_config: usize, cores: usize) -> usize {
    if is_gpu {
        gpu_config.max(1)
    } else if cpu_config > 0 {
        cpu_config
    } else {
        cores.saturating_sub(1).max(1)
    }
}

async fn event_loop(shared: Arc<EngineShared>, mut events: UnboundedReceiver<StratumEvent>) {
    while let Some(event) = events.recv().await {
        if !shared.is_running() {
            // Drain quietly while stopping; stale events must not resurrect
            // status or counters
            continue;
        }
        match event {
            StratumEvent::Status(status) => shared.apply_stratum_status(status),
            StratumEvent::Job(job) => shared.on_job(job),
            StratumEvent::Authorized(success) => shared.on_authorized(success),
            StratumEvent::Difficulty(difficulty) => shared.on_difficulty(difficulty),
            StratumEvent::ShareResult { accepted, message } => {
                shared.on_share_result(accepted, message)
            }
            StratumEvent::Disconnected => shared.on_disconnect(),
            StratumEvent::Error(message) => {
                append_log(&format!("[ENGINE ERROR] {}", message));
                error!("Pool error: {}", message);
            }
        }
    }
}

/// High-level mining engine: connect, receive jobs, hash, submit shares.
#[derive(Clone)]
pub struct MiningEngine {
    shared: Arc<EngineShared>,
}

impl MiningEngine {
    pub fn new() -> Self {
        Self { shared: Arc::new(EngineShared::new()) }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn set_performance_mode(&self, mode: PerformanceMode) {
        *lock(&self.shared.performance_mode) = mode;
        append_log(&format!("[ENGINE] Performance mode: {}", mode));
    }

    /// 0 = auto for either value
    pub fn set_thread_config(&self, gpu_threads: usize, cpu_threads: usize) {
        self.shared.gpu_threads.store(gpu_threads, Ordering::Relaxed);
        self.shared.cpu_threads.store(cpu_threads, Ordering::Relaxed);
        append_log(&format!(
            "[ENGINE] Thread config: GPU={}, CPU={}",
            if gpu_threads == 0 { "auto".to_string() } else { gpu_threads.to_string() },
            if cpu_threads == 0 { "auto".to_string() } else { cpu_threads.to_string() },
        ));
    }

    /// Start mining: validate, discover the kernel backend, connect to the
    /// pool. Idempotent: a second start while running is a no-op.
    pub async fn start(
        &self,
        host: &str,
        port: u16,
        address: &str,
        worker: &str,
        network: &str,
    ) -> Result<(), EngineError> {
        if address.trim().is_empty() {
            return Err(EngineError::MissingAddress);
        }
        config::validate_bitcoin_address(address, network).map_err(EngineError::InvalidAddress)?;

        let shared = &self.shared;
        if shared.running.swap(true, Ordering::SeqCst) {
            append_log("[ENGINE] Already running, ignoring start");
            return Ok(());
        }

        shared.reconnect_enabled.store(true, Ordering::SeqCst);
        shared.stats.reset_for_start();
        shared.initial_diff_suggested.store(false, Ordering::Relaxed);
        shared.measured_diff_suggested.store(false, Ordering::Relaxed);
        *lock(&shared.diff_suggest_time) = None;
        shared.hashes_since_persist.store(0, Ordering::Relaxed);
        *lock(&shared.job_slot) = None;
        *lock(&shared.session_start) = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        shared.stats.set_status(MinerStatus::Starting);
        append_log(&format!("[ENGINE] Starting miner -> {}:{} ({})", host, port, network));
        append_log(&format!("[ENGINE] Worker: {}.{}", address, worker));
        info!("🚀 Starting miner -> {}:{} ({})", host, port, network);

        let kernel = create_kernel();
        append_log(&format!("[ENGINE] Algorithm: SHA-256d, Kernel: {}", kernel.describe()));
        *lock(&shared.kernel) = Some(kernel);

        let params = ReconnectParams {
            host: host.to_string(),
            port,
            address: address.to_string(),
            worker: worker.to_string(),
            network: network.to_string(),
        };
        *lock(&shared.reconnect_params) = Some(params.clone());

        let (events_tx, events_rx) = unbounded_channel();
        *lock(&shared.events_tx) = Some(events_tx);
        tokio::spawn(event_loop(Arc::clone(shared), events_rx));

        shared.stats.set_status(MinerStatus::Connecting);
        shared.connect_stratum(&params).await;
        Ok(())
    }

    /// Stop mining: disable reconnect, drop the pool session, drain workers
    /// (bounded), persist session totals, return to Idle.
    pub async fn stop(&self) {
        let shared = &self.shared;
        if !shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        shared.reconnect_enabled.store(false, Ordering::SeqCst);
        shared.stats.set_status(MinerStatus::Stopping);
        append_log("[ENGINE] Stopping...");

        if let Some(client) = lock(&shared.client).take() {
            client.disconnect();
        }

        // Wake workers so they observe the cleared running flag
        shared.job_cv.notify_all();

        let handles: Vec<_> = lock(&shared.workers).drain(..).collect();
        for handle in handles {
            let deadline = Instant::now() + WORKER_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                error!("Mining thread did not stop within {:?}, detaching", WORKER_JOIN_TIMEOUT);
            }
        }

        self.save_session_stats();

        *lock(&shared.events_tx) = None;
        *lock(&shared.job_slot) = None;
        shared.stats.clear_run();
        shared.stats.set_status(MinerStatus::Idle);
        append_log("[ENGINE] Stopped");
    }

    fn save_session_stats(&self) {
        let shared = &self.shared;
        let runtime = shared.stats.uptime_seconds();
        let accepted = shared.stats.shares_accepted.load(Ordering::Relaxed);
        let peak = shared.stats.peak_hashrate();
        let pending_hashes = shared.hashes_since_persist.swap(0, Ordering::Relaxed);

        let mut stats = config::load_stats();
        stats.total_hashes += pending_hashes;
        stats.total_runtime_seconds += runtime;
        stats.shares_found += accepted;
        if peak > stats.peak_hashrate {
            stats.peak_hashrate = peak;
        }
        stats.sessions.push(SessionRecord {
            start_time: lock(&shared.session_start)
                .take()
                .unwrap_or_else(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            runtime_seconds: runtime,
            shares: accepted,
            peak_hashrate: peak,
        });

        match config::save_stats(&stats) {
            Ok(()) => append_log(&format!(
                "[ENGINE] Session saved: {:.0}s, {} shares, peak {:.2} MH/s",
                runtime,
                accepted,
                peak / 1e6
            )),
            Err(e) => append_log(&format!("[ENGINE ERROR] Failed to save stats: {}", e)),
        }
    }
}

impl Default for MiningEngine {
    fn default() -> Self {
        Self::new()
    }
}


// Changelog:
// - v1.3.0 (2025-07-28): Stratum callbacks replaced with an event channel
//   drained on one task; worker join is bounded; measured-difficulty
//   suggestion is one-shot per run.
// - v1.2.0 (2025-07-12): Added reconnect jitter and the two-phase adaptive
//   difficulty suggestion.
// - v1.0.0 (2025-06-30): Initial engine.
