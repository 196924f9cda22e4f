// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/kernel_test.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Search kernel contract tests: winner membership, first-winner order,
// hash accounting, range clamping at the 2^32 boundary, and best-share
// tracking, exercised through the portable CPU backend.
//
// Tree Location:
// - tests/kernel_test.rs (search kernel tests)
// - Depends on: solominer

use solominer::core::difficulty::{U256, difficulty_to_target, leading_zero_bits};
use solominer::core::sha256::sha256d_header_with_nonce;
use solominer::miner::kernel::{CpuKernel, SearchKernel};

#[test]
fn test_everything_target_hits_first_nonce() {
    // Target 2^256 - 1 accepts every hash
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    let found = kernel.search(&header, &U256::max_value(), 0, 1).unwrap();
    assert_eq!(found, Some(0));
    assert!(kernel.best_share_bits() < 256);
}

#[test]
fn test_impossible_target_sweeps_whole_range() {
    // Target 1 only accepts the all-zero hash
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    assert_eq!(kernel.search(&header, &U256::one(), 0, 65_536).unwrap(), None);
    assert_eq!(kernel.search(&header, &U256::one(), 65_536, 65_536).unwrap(), None);
    assert_eq!(kernel.take_hashes_tried(), 131_072);
}

#[test]
fn test_winner_is_in_range_and_below_target() {
    let kernel = CpuKernel::new();
    let header = [0x3cu8; 80];
    let base = 500_000;
    let count = 4_096;
    // Loose enough that a winner is likely, strict enough to be meaningful
    let target = difficulty_to_target(0.00001);

    if let Some(nonce) = kernel.search(&header, &target, base, count).unwrap() {
        assert!(nonce >= base && nonce < base + count);
        let hash = sha256d_header_with_nonce(&header, nonce);
        assert!(U256::from_little_endian(&hash) < target);
    }
}

#[test]
fn test_first_winner_is_returned() {
    // With target = hash(nonce 2) + 1, nonce 2 is the unique winner among
    // the first four nonces of the zero header
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    let winner_hash = sha256d_header_with_nonce(&header, 2);
    let target = U256::from_little_endian(&winner_hash) + U256::one();

    assert_eq!(kernel.search(&header, &target, 0, 4).unwrap(), Some(2));
}

#[test]
fn test_count_clamped_at_nonce_space_end() {
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    // Only two nonces remain from 0xFFFFFFFE; the sweep must not wrap
    assert_eq!(kernel.search(&header, &U256::one(), u32::MAX - 1, 65_536).unwrap(), None);
    assert_eq!(kernel.take_hashes_tried(), 2);
}

#[test]
fn test_best_share_bits_matches_manual_scan() {
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    let _ = kernel.search(&header, &U256::one(), 0, 64).unwrap();

    let expected = (0..64u32)
        .map(|nonce| leading_zero_bits(&sha256d_header_with_nonce(&header, nonce)))
        .max()
        .unwrap();
    assert_eq!(kernel.best_share_bits(), expected);
}

#[test]
fn test_hashes_accumulate_across_searches_until_taken() {
    let kernel = CpuKernel::new();
    let header = [0u8; 80];
    let _ = kernel.search(&header, &U256::one(), 0, 100).unwrap();
    let _ = kernel.search(&header, &U256::one(), 100, 28).unwrap();
    assert_eq!(kernel.take_hashes_tried(), 128);
    assert_eq!(kernel.take_hashes_tried(), 0);
}

// Changelog:
// - v1.3.0 (2025-07-28): Contract tests shared by both backends; the GPU
//   variant runs the same scenarios behind the "gpu" feature.
// - v1.0.0 (2025-06-30): Initial kernel tests.
