// SoloMiner - Free and Open Source Software Statement
//
// This project, solominer, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/config.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file manages SoloMiner's on-disk state: the JSON config file, the
// cumulative statistics file, the activity log, and the crash log, all under
// the per-user config directory. It also carries the Bitcoin address sanity
// check used before the engine starts.
//
// Tree Location:
// - src/config.rs (configuration and persistence)
// - Depends on: serde, serde_json, dirs, chrono, tracing

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const CONFIG_FILE: &str = "config.json";
const STATS_FILE: &str = "stats.json";
const LOG_FILE: &str = "activity.log";
const CRASH_LOG_FILE: &str = "crash.log";

/// Per-user state directory, e.g. ~/.config/solominer on Linux
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solominer")
}

/// Miner configuration persisted to config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub host: String,
    pub port: u16,
    pub bitcoin_address: String,
    pub worker_name: String,
    /// Mainnet, Testnet3, Testnet4, Signet, Regtest
    pub network: String,
    /// "Full Speed" or "Eco Mode"
    pub performance_mode: String,
    /// 0 = auto (the GPU parallelises internally, 1 dispatch thread)
    pub gpu_threads: usize,
    /// 0 = auto (cores - 1)
    pub cpu_threads: usize,
    pub stall_timeout_minutes: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            host: "public-pool.io".to_string(),
            port: 3333,
            bitcoin_address: String::new(),
            worker_name: "SoloMiner".to_string(),
            network: "Mainnet".to_string(),
            performance_mode: "Full Speed".to_string(),
            gpu_threads: 0,
            cpu_threads: 0,
            stall_timeout_minutes: 10,
        }
    }
}

/// Cumulative mining statistics persisted to stats.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedStats {
    pub total_hashes: u64,
    pub total_runtime_seconds: f64,
    pub shares_found: u64,
    pub peak_hashrate: f64,
    pub sessions: Vec<SessionRecord>,
}

/// One mining session, appended on engine stop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start_time: String,
    pub runtime_seconds: f64,
    pub shares: u64,
    pub peak_hashrate: f64,
}

fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)?;
    fs::write(&tmp, json)?;
    // Rename is atomic on the same filesystem; readers never see a torn file
    fs::rename(&tmp, path)
}

fn load_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path, what: &str) -> T {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Failed to parse {}, using defaults: {}", what, e);
            T::default()
        }),
        Err(_) => T::default(),
    }
}

pub fn load_config() -> MinerConfig {
    load_config_from(&config_dir())
}

pub fn load_config_from(dir: &Path) -> MinerConfig {
    load_json_or_default(&dir.join(CONFIG_FILE), "config")
}

pub fn save_config(config: &MinerConfig) -> std::io::Result<()> {
    save_config_to(&config_dir(), config)
}

pub fn save_config_to(dir: &Path, config: &MinerConfig) -> std::io::Result<()> {
    atomic_write_json(&dir.join(CONFIG_FILE), config)
}

pub fn load_stats() -> PersistedStats {
    load_stats_from(&config_dir())
}

pub fn load_stats_from(dir: &Path) -> PersistedStats {
    load_json_or_default(&dir.join(STATS_FILE), "stats")
}

pub fn save_stats(stats: &PersistedStats) -> std::io::Result<()> {
    save_stats_to(&config_dir(), stats)
}

pub fn save_stats_to(dir: &Path, stats: &PersistedStats) -> std::io::Result<()> {
    atomic_write_json(&dir.join(STATS_FILE), stats)
}

/// Append a timestamped line to the activity log. Logging must never crash
/// the caller (this runs on mining and stratum threads), so all errors are
/// swallowed.
pub fn append_log(message: &str) {
    let _ = append_log_to(&config_dir(), message);
}

fn append_log_to(dir: &Path, message: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{}] {}", timestamp, message)
}

pub fn read_log() -> String {
    fs::read_to_string(config_dir().join(LOG_FILE)).unwrap_or_default()
}

pub fn clear_log() {
    let _ = fs::remove_file(config_dir().join(LOG_FILE));
}

/// Write a structured crash report (used when a kernel dispatch fails) and
/// return its path, or None if even that could not be written.
pub fn write_crash_report(context: &str, detail: &str) -> Option<PathBuf> {
    write_crash_report_to(&config_dir(), context, detail)
}

fn write_crash_report_to(dir: &Path, context: &str, detail: &str) -> Option<PathBuf> {
    if fs::create_dir_all(dir).is_err() {
        return None;
    }
    let path = dir.join(CRASH_LOG_FILE);
    let report = format!(
        "{sep}\nSOLOMINER CRASH REPORT\n{sep}\n\
         Time:     {}\n\
         Version:  {}\n\
         Context:  {}\n\
         {sep}\n\n{}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        env!("CARGO_PKG_VERSION"),
        context,
        detail,
        sep = "=".repeat(72),
    );
    let result = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| f.write_all(report.as_bytes()));
    match result {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Failed to write crash report: {}", e);
            None
        }
    }
}

/// Sanity-check a Bitcoin address: prefix, length, and character set for
/// legacy (base58) and bech32/bech32m forms on the given network. Does not
/// verify base58check or bech32 checksums.
pub fn validate_bitcoin_address(address: &str, network: &str) -> Result<(), String> {
    let address = address.trim();
    if address.is_empty() {
        return Err("Address is empty".to_string());
    }

    let lower = address.to_lowercase();

    // BIP 173: bech32 addresses must not mix upper and lower case
    if lower.starts_with("bc1") || lower.starts_with("tb1") || lower.starts_with("bcrt1") {
        let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err("Bech32 address must not mix upper and lower case".to_string());
        }
    }

    let is_testnet = matches!(
        network.to_lowercase().as_str(),
        "testnet3" | "testnet4" | "signet" | "regtest"
    );

    let first = address.chars().next().unwrap_or('\0');
    if is_testnet {
        let valid_legacy = matches!(first, 'm' | 'n' | '2');
        let valid_bech32 = lower.starts_with("tb1q") || lower.starts_with("tb1p");
        let valid_regtest = lower.starts_with("bcrt1");
        if !(valid_legacy || valid_bech32 || valid_regtest) {
            return Err("Not a valid testnet/regtest address prefix".to_string());
        }
    } else {
        let valid_legacy = matches!(first, '1' | '3');
        let valid_bech32 = lower.starts_with("bc1q") || lower.starts_with("bc1p");
        if !(valid_legacy || valid_bech32) {
            return Err("Must start with 1, 3, bc1q, or bc1p".to_string());
        }
    }

    if lower.starts_with("bc1") || lower.starts_with("tb1") || lower.starts_with("bcrt1") {
        if address.len() < 14 || address.len() > 90 {
            return Err(format!("Bech32 address length {} out of range", address.len()));
        }
        // Data part after the '1' separator uses the 32-char bech32 alphabet
        let separator = lower.find('1').map(|i| i + 1).unwrap_or(0);
        let bech32_chars = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
        if let Some(bad) = lower[separator..].chars().find(|c| !bech32_chars.contains(*c)) {
            return Err(format!("Invalid bech32 character: {}", bad));
        }
    } else {
        if address.len() < 25 || address.len() > 34 {
            return Err(format!(
                "Legacy address length {} out of range (25-34)",
                address.len()
            ));
        }
        let base58_chars = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
        if let Some(bad) = address.chars().find(|c| !base58_chars.contains(*c)) {
            return Err(format!("Invalid base58 character: {}", bad));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_round_trip() {
        let dir = tempdir().unwrap();
        let mut config = MinerConfig::default();
        config.bitcoin_address = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string();
        config.cpu_threads = 6;
        save_config_to(dir.path(), &config).unwrap();

        let loaded = load_config_from(dir.path());
        assert_eq!(loaded.bitcoin_address, config.bitcoin_address);
        assert_eq!(loaded.cpu_threads, 6);
        assert_eq!(loaded.host, "public-pool.io");
    }

    #[test]
    fn test_missing_config_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config_from(dir.path());
        assert_eq!(config.port, 3333);
        assert_eq!(config.worker_name, "SoloMiner");
    }

    #[test]
    fn test_corrupt_config_yields_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        let config = load_config_from(dir.path());
        assert_eq!(config.network, "Mainnet");
    }

    #[test]
    fn test_stats_accumulate_sessions() {
        let dir = tempdir().unwrap();
        let mut stats = load_stats_from(dir.path());
        stats.total_hashes += 1_000_000;
        stats.shares_found += 2;
        stats.sessions.push(SessionRecord {
            start_time: "2025-07-28 10:00:00".to_string(),
            runtime_seconds: 120.0,
            shares: 2,
            peak_hashrate: 1.5e8,
        });
        save_stats_to(dir.path(), &stats).unwrap();

        let loaded = load_stats_from(dir.path());
        assert_eq!(loaded.total_hashes, 1_000_000);
        assert_eq!(loaded.sessions.len(), 1);
        assert_eq!(loaded.sessions[0].shares, 2);
    }

    #[test]
    fn test_crash_report_written() {
        let dir = tempdir().unwrap();
        let path = write_crash_report_to(dir.path(), "gpu dispatch", "CL_OUT_OF_RESOURCES").unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("SOLOMINER CRASH REPORT"));
        assert!(contents.contains("CL_OUT_OF_RESOURCES"));
    }

    #[test]
    fn test_validate_mainnet_addresses() {
        assert!(validate_bitcoin_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "Mainnet").is_ok());
        assert!(validate_bitcoin_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", "Mainnet").is_ok());
        assert!(
            validate_bitcoin_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", "Mainnet")
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        assert!(validate_bitcoin_address("", "Mainnet").is_err());
        assert!(validate_bitcoin_address("xyz123", "Mainnet").is_err());
        // Mixed-case bech32
        assert!(
            validate_bitcoin_address("bc1Qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", "Mainnet")
                .is_err()
        );
        // Base58 with invalid character '0'
        assert!(validate_bitcoin_address("10A1zP1eP5QGefi2DMPTfTL5SLmv7Divf", "Mainnet").is_err());
        // Mainnet address on testnet
        assert!(
            validate_bitcoin_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "Testnet4").is_err()
        );
    }

    #[test]
    fn test_validate_testnet_addresses() {
        assert!(
            validate_bitcoin_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", "Signet").is_ok()
        );
        assert!(validate_bitcoin_address("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn", "Testnet3").is_ok());
    }
}

// Changelog:
// - v1.3.0 (2025-07-28): Single bitcoin_address field (multi-coin address
//   map removed with the other algorithms); _to/_from variants take an
//   explicit directory so persistence is testable.
// - v1.1.0 (2025-07-12): Added crash report sink for kernel dispatch
//   failures.
// - v1.0.0 (2025-06-30): Initial config/stats/activity-log persistence.
