// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/lib.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file serves as the main library entry point for SoloMiner, located
// at the root of the source tree. It exports all public modules and types
// that other crates or binaries can use.
//
// Tree Location:
// - src/lib.rs (root library file)
// - Exports modules: config, core, miner, pool, utils

pub mod config;
pub mod core;
pub mod miner;
pub mod pool;
pub mod utils;

// Re-export commonly used types at the crate root for convenience
pub use crate::core::types::{Args, MinerStatus, PerformanceMode};
pub use crate::miner::{EngineSnapshot, MiningEngine};
pub use crate::pool::{StratumClient, StratumEvent};
pub use crate::utils::FormatUtils;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

// Changelog:
// - v1.3.0 (2025-07-28): Bitcoin-only module layout: config, core, miner,
//   pool, utils.
// - v1.0.0 (2025-06-30): Initial library root.
