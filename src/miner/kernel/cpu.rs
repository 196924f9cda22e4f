// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/kernel/cpu.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Portable CPU search kernel: serial SHA-256d nonce sweep with the same
// target semantics as the GPU path. Kept bit-identical with the OpenCL
// kernel so either can serve as the reference for the other.
//
// Tree Location:
// - src/miner/kernel/cpu.rs (CPU fallback search kernel)
// - Depends on: core, kernel counters

use super::{KernelCounters, KernelError, SearchKernel, clamp_count};
use crate::core::difficulty::{U256, leading_zero_bits};
use crate::core::sha256::sha256d;

pub struct CpuKernel {
    counters: KernelCounters,
}

impl CpuKernel {
    pub fn new() -> Self {
        Self { counters: KernelCounters::default() }
    }
}

impl Default for CpuKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchKernel for CpuKernel {
    fn search(
        &self,
        header: &[u8; 80],
        target: &U256,
        base_nonce: u32,
        count: u32,
    ) -> Result<Option<u32>, KernelError> {
        let count = clamp_count(base_nonce, count);
        let mut buf = *header;

        for offset in 0..count {
            let nonce = base_nonce.wrapping_add(offset);
            buf[76..80].copy_from_slice(&nonce.to_le_bytes());
            let hash = sha256d(&buf);

            self.counters.update_best_bits(leading_zero_bits(&hash));

            if U256::from_little_endian(&hash) < *target {
                self.counters.add_hashes(offset as u64 + 1);
                return Ok(Some(nonce));
            }
        }

        self.counters.add_hashes(count as u64);
        Ok(None)
    }

    fn take_hashes_tried(&self) -> u64 {
        self.counters.take_hashes()
    }

    fn best_share_bits(&self) -> u32 {
        self.counters.best_bits()
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("CPU SHA-256d ({} cores)", num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guaranteed_hit_at_base() {
        // Maximum target accepts any hash, so the first nonce wins
        let kernel = CpuKernel::new();
        let header = [0u8; 80];
        let found = kernel.search(&header, &U256::max_value(), 0, 1).unwrap();
        assert_eq!(found, Some(0));
        assert!(kernel.best_share_bits() < 256);
        assert_eq!(kernel.take_hashes_tried(), 1);
    }

    #[test]
    fn test_no_hit_counts_full_range() {
        let kernel = CpuKernel::new();
        let header = [0u8; 80];
        let target = U256::one();
        assert_eq!(kernel.search(&header, &target, 0, 65_536).unwrap(), None);
        assert_eq!(kernel.search(&header, &target, 65_536, 65_536).unwrap(), None);
        assert_eq!(kernel.take_hashes_tried(), 131_072);
    }

    #[test]
    fn test_returns_first_winner_in_range() {
        // Target just above the SHA256d of the zero header with nonce 2,
        // which is the smallest hash among nonces 0..4: only nonce 2 wins.
        let kernel = CpuKernel::new();
        let header = [0u8; 80];
        let mut buf = header;
        buf[76..80].copy_from_slice(&2u32.to_le_bytes());
        let target = U256::from_little_endian(&sha256d(&buf)) + U256::one();

        assert_eq!(kernel.search(&header, &target, 0, 4).unwrap(), Some(2));
        // Partial sweeps still count every evaluated nonce
        assert_eq!(kernel.take_hashes_tried(), 3);
    }

    #[test]
    fn test_winner_always_inside_range() {
        let kernel = CpuKernel::new();
        let header = [0x5au8; 80];
        let base = 1_000;
        let count = 256;
        if let Some(nonce) = kernel.search(&header, &U256::max_value(), base, count).unwrap() {
            assert!(nonce >= base && nonce < base + count);
        }
    }

    #[test]
    fn test_range_clamped_at_wrap() {
        let kernel = CpuKernel::new();
        let header = [0u8; 80];
        // Only two nonces fit between 0xFFFFFFFE and 2^32
        assert_eq!(kernel.search(&header, &U256::one(), u32::MAX - 1, 65_536).unwrap(), None);
        assert_eq!(kernel.take_hashes_tried(), 2);
    }

    #[test]
    fn test_best_bits_tracks_across_calls() {
        let kernel = CpuKernel::new();
        let header = [0u8; 80];
        let _ = kernel.search(&header, &U256::one(), 0, 16).unwrap();
        let first = kernel.best_share_bits();
        assert!(first > 0);
        let _ = kernel.search(&header, &U256::one(), 16, 16).unwrap();
        assert!(kernel.best_share_bits() >= first);
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Comparison moved to full 256-bit little-endian
//   convention; best-share bits updated per evaluated nonce so the GPU and
//   CPU paths report the same range statistics.
// - v1.0.0 (2025-06-30): Initial serial sweep.
