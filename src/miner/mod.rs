// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/mod.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the mining functionality of
// SoloMiner. It declares submodules and re-exports key types.
//
// Tree Location:
// - src/miner/mod.rs (miner module entry point)
// - Submodules: engine, kernel, stats, worker

pub mod engine;
pub mod kernel;
pub mod stats;
pub(crate) mod worker;

// Re-export key types for convenience
pub use engine::{EngineError, MiningEngine};
pub use kernel::{CpuKernel, KernelError, SearchKernel, create_kernel};
pub use stats::{EngineSnapshot, MinerStats};

// Changelog:
// - v1.3.0 (2025-07-28): cpu/gpu miner split replaced by one engine over a
//   SearchKernel trait.
// - v1.0.0 (2025-06-30): Initial miner module layout.
