// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/mod.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the core functionality of
// SoloMiner, located in the core subdirectory. It declares submodules and
// re-exports key types for use throughout the project.
//
// Tree Location:
// - src/core/mod.rs (core module entry point)
// - Submodules: difficulty, header, sha256, types

pub mod difficulty;
pub mod header;
pub mod sha256;
pub mod types;

// Re-export the most commonly used items
pub use difficulty::{U256, difficulty_to_target, leading_zero_bits, target_to_le_words};
pub use header::{build_block_header, compute_merkle_root};
pub use sha256::{sha256d, sha256d_header_with_nonce};
pub use types::{Args, MinerStatus, PerformanceMode, Share};

// Changelog:
// - v1.3.0 (2025-07-28): header/difficulty reorganised around 256-bit
//   targets; sha3x module removed.
// - v1.0.0 (2025-06-30): Initial core module layout.
