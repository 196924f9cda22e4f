// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/types.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines core data structures for SoloMiner, located in the core
// subdirectory. It includes command-line arguments, engine status values,
// performance modes, and the share candidate type produced by the workers.
//
// Tree Location:
// - src/core/types.rs (core data structures)
// - Depends on: clap, serde

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Command-line arguments for SoloMiner
#[derive(Parser, Debug)]
#[command(
    name = "solominer",
    version,
    about = "Solo Bitcoin (SHA-256d) miner for Stratum v1 pools",
    long_about = "SoloMiner is a solo Bitcoin miner that connects to a Stratum v1 pool,\n\
                  builds block headers from pool jobs, and sweeps the nonce space with\n\
                  an OpenCL GPU kernel (CPU fallback) until a share is found.\n\n\
                  Examples:\n\
                    solominer -a bc1qYourAddress -p public-pool.io --port 3333\n\
                    solominer -a bc1qYourAddress -p eusolo.ckpool.org --port 3333 --cpu-threads 6"
)]
pub struct Args {
    /// Bitcoin address for mining payout
    #[arg(short = 'a', long = "address", value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Pool hostname (default from config: public-pool.io)
    #[arg(short = 'p', long = "pool", value_name = "HOST")]
    pub pool: Option<String>,

    /// Pool port (default from config: 3333)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Worker name for pool identification
    #[arg(short = 'w', long = "worker", value_name = "NAME")]
    pub worker: Option<String>,

    /// Bitcoin network: Mainnet, Testnet3, Testnet4, Signet, Regtest
    #[arg(long, value_name = "NETWORK")]
    pub network: Option<String>,

    /// Number of GPU dispatch threads (0 = auto; the GPU parallelises internally)
    #[arg(long, value_name = "COUNT")]
    pub gpu_threads: Option<usize>,

    /// Number of CPU mining threads (0 = auto: cores - 1)
    #[arg(long, value_name = "COUNT")]
    pub cpu_threads: Option<usize>,

    /// Eco mode: throttle between batches to reduce power draw
    #[arg(long, default_value = "false")]
    pub eco: bool,
}

/// Engine/stratum status exposed to observers.
///
/// The stratum client reports the connection-stage values; the engine adds
/// the lifecycle values (Starting, Mining, Reconnecting, Stopping, Idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerStatus {
    Idle,
    Starting,
    Connecting,
    Connected,
    Subscribing,
    Subscribed,
    Authorizing,
    Authorized,
    Mining,
    Disconnected,
    Reconnecting,
    AuthFailed,
    SubscribeFailed,
    DnsFailed,
    Timeout,
    Refused,
    Error,
    Stopping,
}

impl fmt::Display for MinerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MinerStatus::Idle => "Idle",
            MinerStatus::Starting => "Starting",
            MinerStatus::Connecting => "Connecting",
            MinerStatus::Connected => "Connected",
            MinerStatus::Subscribing => "Subscribing",
            MinerStatus::Subscribed => "Subscribed",
            MinerStatus::Authorizing => "Authorizing",
            MinerStatus::Authorized => "Authorized",
            MinerStatus::Mining => "Mining",
            MinerStatus::Disconnected => "Disconnected",
            MinerStatus::Reconnecting => "Reconnecting",
            MinerStatus::AuthFailed => "Auth Failed",
            MinerStatus::SubscribeFailed => "Subscribe Failed",
            MinerStatus::DnsFailed => "DNS Failed",
            MinerStatus::Timeout => "Timeout",
            MinerStatus::Refused => "Refused",
            MinerStatus::Error => "Error",
            MinerStatus::Stopping => "Stopping",
        };
        write!(f, "{}", s)
    }
}

impl MinerStatus {
    /// Once mining, an early-stage stratum status must not regress the
    /// display (a reconnect keepalive or stray callback would otherwise
    /// flip a mining rig back to "Subscribed").
    pub fn is_pre_mining_stage(&self) -> bool {
        matches!(
            self,
            MinerStatus::Subscribed | MinerStatus::Authorizing | MinerStatus::Authorized
        )
    }
}

/// Worker performance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceMode {
    FullSpeed,
    EcoMode,
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceMode::FullSpeed => write!(f, "Full Speed"),
            PerformanceMode::EcoMode => write!(f, "Eco Mode"),
        }
    }
}

impl FromStr for PerformanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full speed" | "fullspeed" | "full" => Ok(PerformanceMode::FullSpeed),
            "eco mode" | "ecomode" | "eco" => Ok(PerformanceMode::EcoMode),
            other => Err(format!("unknown performance mode: {}", other)),
        }
    }
}

/// A share candidate found by a worker, ready for submission.
/// Consumed exactly once by `StratumClient::submit_share`.
#[derive(Debug, Clone)]
pub struct Share {
    /// Job this share was mined against
    pub job_id: String,

    /// Miner-chosen extranonce2, lowercase hex of exactly
    /// 2 * extranonce2_size characters
    pub extranonce2: String,

    /// Job n_time, echoed back as received
    pub n_time: String,

    /// Winning nonce, 8-hex-char lowercase little-endian value
    pub nonce: String,
}

impl Share {
    pub fn new(job_id: String, extranonce2: String, n_time: String, nonce: u32) -> Self {
        Self {
            job_id,
            extranonce2,
            n_time,
            nonce: format!("{:08x}", nonce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_strings() {
        assert_eq!(MinerStatus::AuthFailed.to_string(), "Auth Failed");
        assert_eq!(MinerStatus::DnsFailed.to_string(), "DNS Failed");
        assert_eq!(MinerStatus::Mining.to_string(), "Mining");
    }

    #[test]
    fn test_pre_mining_stage_gating() {
        assert!(MinerStatus::Subscribed.is_pre_mining_stage());
        assert!(MinerStatus::Authorized.is_pre_mining_stage());
        assert!(!MinerStatus::Disconnected.is_pre_mining_stage());
        assert!(!MinerStatus::Mining.is_pre_mining_stage());
    }

    #[test]
    fn test_performance_mode_round_trip() {
        let mode: PerformanceMode = "Eco Mode".parse().unwrap();
        assert_eq!(mode, PerformanceMode::EcoMode);
        assert_eq!(mode.to_string().parse::<PerformanceMode>().unwrap(), mode);
    }

    #[test]
    fn test_share_nonce_rendering() {
        let share = Share::new("j1".into(), "00aabbcc".into(), "66aabbcc".into(), 0xbeef);
        assert_eq!(share.nonce, "0000beef");
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Dropped the algorithm/coin selection arguments; the
//   miner is SHA-256d/Bitcoin only. Args now layer over the persisted config
//   instead of duplicating defaults.
// - v1.1.0 (2025-07-12): Added MinerStatus gating helper for the
//   once-mining-never-regress display rule.
// - v1.0.0 (2025-06-30): Initial CLI arguments and share candidate types.
