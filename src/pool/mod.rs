// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/pool/mod.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for pool communication in SoloMiner.
// It declares submodules and re-exports key types.
//
// Tree Location:
// - src/pool/mod.rs (pool module entry point)
// - Submodules: client, job, messages

pub mod client;
pub mod job;
pub mod messages;

// Re-export key types for convenience
pub use client::{StratumClient, StratumEvent};
pub use job::StratumJob;
pub use messages::StratumProtocol;

// Changelog:
// - v1.3.0 (2025-07-28): Stratum v1 session split into client/job/messages.
// - v1.0.0 (2025-06-30): Initial pool module layout.
