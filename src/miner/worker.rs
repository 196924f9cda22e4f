// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/worker.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the mining worker loop. Each worker owns a slice of
// the 32-bit nonce space: on every job change it re-derives a random start
// inside its partition, then sweeps batches through the search kernel,
// rebuilding the header (fresh extranonce2, current difficulty) per batch.
//
// Tree Location:
// - src/miner/worker.rs (mining worker loop)
// - Depends on: core, kernel, engine shared state, rand, hex

use crate::config::{append_log, write_crash_report};
use crate::core::difficulty::difficulty_to_target;
use crate::core::header::{build_block_header, compute_merkle_root};
use crate::core::types::{PerformanceMode, Share};
use crate::miner::engine::{CPU_BATCH_SIZE, EngineShared, GPU_BATCH_SIZE, STATS_PERSIST_INTERVAL};
use crate::miner::kernel::KernelError;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Throttle between batches in Eco Mode
const ECO_SLEEP: Duration = Duration::from_millis(50);

/// Give the pool a moment to deliver the first mining.set_difficulty after
/// the post-authorize suggestion, so the first batches are not mined
/// against a wrong target.
fn wait_for_initial_difficulty(shared: &EngineShared) -> f64 {
    thread::sleep(Duration::from_secs(2));
    let mut difficulty = shared.stats.difficulty();
    if difficulty <= 0.0 {
        for _ in 0..10 {
            if !shared.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(300));
            difficulty = shared.stats.difficulty();
            if difficulty > 0.0 {
                break;
            }
        }
    }
    difficulty
}

/// Body of one mining worker thread. `worker_index` partitions the nonce
/// space across the `worker_total` workers.
pub(crate) fn mining_loop(shared: Arc<EngineShared>, worker_index: usize, worker_total: usize) {
    let mut rng = rand::thread_rng();
    append_log(&format!("[ENGINE] Mining loop {} started", worker_index));

    let Some(kernel) = shared.kernel() else {
        error!("Mining loop {} has no kernel, exiting", worker_index);
        return;
    };
    let batch_size = if kernel.is_gpu() { GPU_BATCH_SIZE } else { CPU_BATCH_SIZE };

    let difficulty = wait_for_initial_difficulty(&shared);
    append_log(&format!("[ENGINE] Mining with pool difficulty: {}", difficulty));

    let mut current_job_id: Option<String> = None;
    let mut nonce_cursor: u32 = 0;
    let mut last_hashrate_time = Instant::now();
    let mut last_persist_time = Instant::now();

    while shared.is_running() {
        let Some(job) = shared.current_job() else {
            shared.wait_for_job(Duration::from_secs(1));
            continue;
        };

        // Job switch: re-partition and pick a random start in our slice
        if current_job_id.as_deref() != Some(job.job_id.as_str()) {
            current_job_id = Some(job.job_id.clone());
            let workers = worker_total.max(1) as u32;
            let partition_size = u32::MAX / workers;
            nonce_cursor = rng
                .gen_range(0..=partition_size)
                .wrapping_add((worker_index as u32).wrapping_mul(partition_size));
            append_log(&format!(
                "[ENGINE] Mining job {} thread={}, nonce_start=0x{:08x}",
                job.job_id, worker_index, nonce_cursor
            ));
        }

        // Fresh extranonce2 per attempt: uniform random bytes, lowercase hex
        let mut extranonce2_bytes = vec![0u8; job.extranonce2_size];
        rng.fill(&mut extranonce2_bytes[..]);
        let extranonce2 = hex::encode(&extranonce2_bytes);

        let header = match compute_merkle_root(
            &job.coinb1,
            &job.coinb2,
            &job.extranonce1,
            &extranonce2,
            &job.merkle_branch,
        )
        .and_then(|merkle_root| {
            build_block_header(&job.version, &job.prev_hash, &merkle_root, &job.n_time, &job.n_bits, 0)
        }) {
            Ok(header) => header,
            Err(e) => {
                append_log(&format!("[ENGINE ERROR] Mining loop: {}", e));
                error!("Failed to build header for job {}: {}", job.job_id, e);
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        // Share target from the most recently observed pool difficulty,
        // NOT the block target from nBits
        let mut share_difficulty = shared.stats.difficulty();
        if share_difficulty <= 0.0 {
            share_difficulty = 1.0;
        }
        let share_target = difficulty_to_target(share_difficulty);

        let found = match kernel.search(&header, &share_target, nonce_cursor, batch_size) {
            Ok(found) => found,
            Err(KernelError::DispatchFailed(message)) => {
                let crash_path = write_crash_report("kernel dispatch", &message);
                append_log(&format!(
                    "[ENGINE ERROR] GPU error: {} (crash report: {:?})",
                    message, crash_path
                ));
                warn!("GPU dispatch failed: {} - backing off 5s", message);
                // Let GPU memory pressure subside before retrying
                thread::sleep(Duration::from_secs(5));
                continue;
            }
        };

        // Hashrate tick: worker 0 owns the read-and-reset so the counter is
        // measured over one coherent window
        if worker_index == 0 && last_hashrate_time.elapsed() >= Duration::from_secs(1) {
            let elapsed = last_hashrate_time.elapsed().as_secs_f64();
            let hashes = kernel.take_hashes_tried();
            let hashrate = hashes as f64 / elapsed;
            shared.stats.update_hashrate(hashrate);
            shared
                .stats
                .best_share_bits
                .fetch_max(kernel.best_share_bits(), Ordering::Relaxed);
            shared.record_hashes(hashes);
            last_hashrate_time = Instant::now();

            shared.maybe_suggest_measured_difficulty(hashrate);

            if last_persist_time.elapsed() > STATS_PERSIST_INTERVAL {
                shared.persist_hashes();
                last_persist_time = Instant::now();
            }
        }

        if let Some(raw_nonce) = found {
            // The GPU hashes the nonce as a big-endian word; byte-swap its
            // winner to the value that packs little-endian into offset 76.
            // The CPU path already reports that value.
            let nonce = if kernel.is_gpu() { raw_nonce.swap_bytes() } else { raw_nonce };
            let share = Share::new(job.job_id.clone(), extranonce2, job.n_time.clone(), nonce);

            shared.stats.shares_submitted.fetch_add(1, Ordering::Relaxed);
            append_log(&format!(
                "[ENGINE] *** SHARE FOUND *** nonce=0x{:08x} hex={} job={}",
                raw_nonce, share.nonce, job.job_id
            ));
            info!("💎 Share found! nonce={} job={}", share.nonce, job.job_id);
            shared.submit_share(&share);
        }

        nonce_cursor = nonce_cursor.wrapping_add(batch_size);

        // A job switch is picked up at the top of the loop; nothing to do
        // here beyond the optional throttle
        if shared.performance_mode() == PerformanceMode::EcoMode {
            thread::sleep(ECO_SLEEP);
        }
    }

    append_log(&format!("[ENGINE] Mining loop {} stopped", worker_index));
}

// Changelog:
// - v1.3.0 (2025-07-28): Worker rebuilds the header per batch from the
//   job's own extranonce values; hashrate ownership pinned to worker 0.
// - v1.0.0 (2025-06-30): Initial worker loop.
