// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/difficulty.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the 256-bit target arithmetic for Bitcoin SHA-256d
// mining: pool-difficulty to share-target conversion, the word layout the
// search kernels compare against, leading-zero scoring of hashes, compact
// nBits expansion, and the measured-hashrate difficulty suggestion.
//
// Tree Location:
// - src/core/difficulty.rs (target and difficulty arithmetic)
// - Depends on: uint, tracing

use tracing::warn;
use uint::construct_uint;

construct_uint! {
    pub struct U256(4);
}

/// Bitcoin's difficulty-1 share target: 0x00000000FFFF0000 * 2^192.
/// Pool share targets are derived as DIFF1_TARGET / difficulty.
pub fn diff1_target() -> U256 {
    U256::from(0xFFFFu64) << 208
}

/// Convert a pool share difficulty to a 256-bit target.
///
/// Non-positive difficulties accept everything; results are clamped to
/// [1, 2^256 - 1]. The division carries 32 fractional bits so sub-unity
/// difficulties (e.g. the initial 0.5 suggestion) stay exact enough.
pub fn difficulty_to_target(difficulty: f64) -> U256 {
    if difficulty <= 0.0 {
        return U256::max_value();
    }
    let scaled = difficulty * 4294967296.0; // difficulty * 2^32
    if !scaled.is_finite() || scaled >= 1.7e38 {
        // Beyond any sane pool difficulty; hardest representable target
        return U256::one();
    }
    let denominator = (scaled as u128).max(1);
    let numerator = diff1_target() << 32;
    let target = numerator / U256::from(denominator);
    if target.is_zero() { U256::one() } else { target }
}

/// Lay a target out as the eight 32-bit words the search kernels compare
/// against, most significant word first:
///
/// `word[0]` holds the most significant 4 bytes of the target interpreted
/// as a little-endian uint256, `word[7]` the least significant. A SHA-256
/// output word `state[7 - i]`, byte-swapped, compares directly against
/// `word[i]`.
pub fn target_to_le_words(target: &U256) -> [u32; 8] {
    let mut words = [0u32; 8];
    for (i, word) in words.iter_mut().enumerate() {
        *word = ((*target >> (224 - 32 * i)).low_u64() & 0xFFFF_FFFF) as u32;
    }
    words
}

/// True when `hash` (a raw SHA-256d output) interpreted as a little-endian
/// uint256 is strictly below `target`.
pub fn hash_meets_target(hash: &[u8; 32], target: &U256) -> bool {
    U256::from_little_endian(hash) < *target
}

/// Count of leading zero bits of the hash in its little-endian uint256
/// interpretation. Used for best-share tracking.
pub fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    U256::from_little_endian(hash).leading_zeros()
}

/// Expand a compact-form nBits word into the 256-bit network block target.
pub fn nbits_to_target(nbits: u32) -> U256 {
    let exponent = (nbits >> 24) as usize;
    let mantissa = U256::from(nbits & 0x007F_FFFF);
    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    }
}

/// Compute the share difficulty to suggest to the pool so that a miner
/// running at `hashrate` H/s finds roughly one share per
/// `target_interval_secs`: `d = hashrate * interval / 2^32`, clamped to
/// [0.001, 1_000_000] and rounded to 4 significant figures.
pub fn optimal_difficulty(hashrate: f64, target_interval_secs: f64) -> f64 {
    let raw = hashrate * target_interval_secs / 4294967296.0;
    let clamped = raw.clamp(0.001, 1_000_000.0);
    round_to_4_sig_figs(clamped)
}

fn round_to_4_sig_figs(value: f64) -> f64 {
    // 4 significant figures = 3 decimals in scientific notation
    format!("{:.3e}", value).parse().unwrap_or_else(|_| {
        warn!("Failed to round difficulty {} to 4 significant figures", value);
        value
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff1_target_bytes() {
        let be = diff1_target().to_big_endian();
        assert_eq!(&be[0..8], &[0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
        assert!(be[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_difficulty_one_is_diff1() {
        assert_eq!(difficulty_to_target(1.0), diff1_target());
    }

    #[test]
    fn test_difficulty_two_halves_target() {
        assert_eq!(difficulty_to_target(2.0), diff1_target() / U256::from(2u64));
    }

    #[test]
    fn test_fractional_difficulty_doubles_target() {
        assert_eq!(difficulty_to_target(0.5), diff1_target() * U256::from(2u64));
    }

    #[test]
    fn test_nonpositive_difficulty_accepts_everything() {
        assert_eq!(difficulty_to_target(0.0), U256::max_value());
        assert_eq!(difficulty_to_target(-3.0), U256::max_value());
    }

    #[test]
    fn test_extreme_difficulty_clamps_to_one() {
        assert_eq!(difficulty_to_target(1e60), U256::one());
    }

    #[test]
    fn test_target_words_for_diff1() {
        let words = target_to_le_words(&diff1_target());
        assert_eq!(words[0], 0x00000000);
        assert_eq!(words[1], 0xFFFF0000);
        assert!(words[2..].iter().all(|&w| w == 0));
    }

    #[test]
    fn test_target_words_round_trip_max() {
        let words = target_to_le_words(&U256::max_value());
        assert!(words.iter().all(|&w| w == 0xFFFFFFFF));
    }

    #[test]
    fn test_hash_meets_target_boundary() {
        let mut hash = [0u8; 32];
        hash[31] = 0x01; // LE uint256 = 1 << 248
        let just_above = (U256::one() << 248) + U256::one();
        let exact = U256::one() << 248;
        assert!(hash_meets_target(&hash, &just_above));
        assert!(!hash_meets_target(&hash, &exact));
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits(&[0u8; 32]), 256);
        let mut hash = [0u8; 32];
        hash[31] = 0x01;
        assert_eq!(leading_zero_bits(&hash), 7);
        // Locked vector: SHA256d of 80 zero bytes has 3 leading zero bits (LE)
        let mut known = [0u8; 32];
        hex::decode_to_slice(
            "4be7570e8f70eb093640c8468274ba759745a7aa2b7d25ab1e0421b259845014",
            &mut known,
        )
        .unwrap();
        assert_eq!(leading_zero_bits(&known), 3);
    }

    #[test]
    fn test_nbits_genesis_is_diff1() {
        assert_eq!(nbits_to_target(0x1d00ffff), diff1_target());
    }

    #[test]
    fn test_nbits_small_exponent() {
        assert_eq!(nbits_to_target(0x03123456), U256::from(0x123456u64));
        assert_eq!(nbits_to_target(0x02123456), U256::from(0x1234u64));
    }

    #[test]
    fn test_optimal_difficulty_hundred_mhs() {
        // 100 MH/s at one share per 20s: 100e6 * 20 / 2^32 = 0.46566...
        let diff = optimal_difficulty(100e6, 20.0);
        assert!((diff - 0.4657).abs() < 1e-12);
    }

    #[test]
    fn test_optimal_difficulty_clamps() {
        assert_eq!(optimal_difficulty(1.0, 20.0), 0.001);
        assert_eq!(optimal_difficulty(1e18, 20.0), 1_000_000.0);
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Full 256-bit precision throughout; dropped the old
//   u64-truncated comparison helpers now that both kernels compare against
//   U256 word layouts.
// - v1.1.0 (2025-07-12): Added optimal_difficulty for the measured-hashrate
//   suggestion and leading_zero_bits for best-share tracking.
// - v1.0.0 (2025-06-30): Initial target arithmetic.
