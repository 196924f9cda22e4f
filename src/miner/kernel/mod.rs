// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/kernel/mod.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the search kernel contract shared by the OpenCL GPU
// path and the portable CPU path, plus the counters both report through.
// The engine selects whichever backend is available at startup; the two
// must produce bit-identical SHA-256d results.
//
// Tree Location:
// - src/miner/kernel/mod.rs (search kernel trait and selection)
// - Submodules: cpu, opencl (feature "gpu")

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod opencl;

use crate::core::difficulty::U256;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

pub use cpu::CpuKernel;

#[derive(Debug, Error)]
pub enum KernelError {
    /// The hardware dispatch reported an error state. Not fatal: the engine
    /// logs a crash record, backs off, and retries.
    #[error("kernel dispatch failed: {0}")]
    DispatchFailed(String),
}

/// Counters shared by both kernel backends.
#[derive(Default)]
pub struct KernelCounters {
    hashes_tried: AtomicU64,
    best_share_bits: AtomicU32,
}

impl KernelCounters {
    pub fn add_hashes(&self, count: u64) {
        self.hashes_tried.fetch_add(count, Ordering::Relaxed);
    }

    /// Read-and-reset, consumed by the engine's hashrate tick
    pub fn take_hashes(&self) -> u64 {
        self.hashes_tried.swap(0, Ordering::Relaxed)
    }

    /// Lock-free max-update against the running best
    pub fn update_best_bits(&self, bits: u32) {
        self.best_share_bits.fetch_max(bits, Ordering::Relaxed);
    }

    pub fn best_bits(&self) -> u32 {
        self.best_share_bits.load(Ordering::Relaxed)
    }
}

/// A SHA-256d nonce-range search backend.
///
/// `search` evaluates SHA256d(header with nonce n) for every
/// `n in [base_nonce, base_nonce + count)` (count clamped so the range never
/// crosses 2^32) against `target` in Bitcoin's little-endian uint256
/// convention, returning a winning nonce if one exists. The returned value
/// is in the backend's native nonce domain; GPU winners are word-order
/// values that the caller byte-swaps before submission (see `is_gpu`).
pub trait SearchKernel: Send + Sync {
    fn search(
        &self,
        header: &[u8; 80],
        target: &U256,
        base_nonce: u32,
        count: u32,
    ) -> Result<Option<u32>, KernelError>;

    /// Hashes evaluated since the last call; read-and-reset
    fn take_hashes_tried(&self) -> u64;

    /// Maximum leading-zero-bit count (LE interpretation) ever observed
    fn best_share_bits(&self) -> u32;

    /// True when winners are reported in the GPU's big-endian word domain
    /// and must be byte-swapped to the header nonce value
    fn is_gpu(&self) -> bool;

    /// Human-readable backend description for logs
    fn describe(&self) -> String;
}

/// Clamp `count` so `base_nonce + count` does not exceed 2^32.
pub(crate) fn clamp_count(base_nonce: u32, count: u32) -> u32 {
    let remaining = (u32::MAX as u64) - (base_nonce as u64) + 1;
    if (count as u64) <= remaining { count } else { remaining as u32 }
}

/// Pick the best available backend: GPU when compiled in and a device
/// responds, otherwise the portable CPU path. No dynamic switching inside a
/// run.
pub fn create_kernel() -> Arc<dyn SearchKernel> {
    #[cfg(feature = "gpu")]
    {
        match opencl::OpenClKernel::create() {
            Ok(kernel) => {
                info!("🎮 GPU search kernel ready: {}", kernel.describe());
                return Arc::new(kernel);
            }
            Err(e) => {
                info!("No usable GPU, falling back to CPU: {}", e);
            }
        }
    }
    let kernel = CpuKernel::new();
    info!("💻 CPU search kernel ready: {}", kernel.describe());
    Arc::new(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_count_at_wrap_boundary() {
        assert_eq!(clamp_count(0, 1000), 1000);
        assert_eq!(clamp_count(u32::MAX, 1000), 1);
        assert_eq!(clamp_count(u32::MAX - 1, 1000), 2);
        assert_eq!(clamp_count(0, u32::MAX), u32::MAX);
    }

    #[test]
    fn test_counters_read_and_reset() {
        let counters = KernelCounters::default();
        counters.add_hashes(100);
        counters.add_hashes(31);
        assert_eq!(counters.take_hashes(), 131);
        assert_eq!(counters.take_hashes(), 0);
    }

    #[test]
    fn test_best_bits_monotonic() {
        let counters = KernelCounters::default();
        counters.update_best_bits(5);
        counters.update_best_bits(3);
        assert_eq!(counters.best_bits(), 5);
        counters.update_best_bits(12);
        assert_eq!(counters.best_bits(), 12);
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Trait seam between the engine and the backends so
//   tests can drive the engine with a synthetic kernel.
// - v1.0.0 (2025-06-30): Initial GPU/CPU kernel split.
