// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/mod.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Statistics module entry point.
//
// Tree Location:
// - src/miner/stats/mod.rs (stats module entry point)
// - Submodules: miner_stats

pub mod miner_stats;

pub use miner_stats::{EngineSnapshot, MinerStats};
