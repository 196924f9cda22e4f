// SoloMiner - Free and Open Source Software Statement
//
// File: src/main.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// CLI entry point: layer command-line flags over the persisted config,
// start the engine, print a status line every 30 seconds, stop on Ctrl-C.

use clap::Parser;
use solominer::core::types::{Args, PerformanceMode};
use solominer::{FormatUtils, MiningEngine, Result, config};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // CLI flags override the persisted configuration
    let mut cfg = config::load_config();
    if let Some(address) = args.address {
        cfg.bitcoin_address = address;
    }
    if let Some(pool) = args.pool {
        cfg.host = pool;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(worker) = args.worker {
        cfg.worker_name = worker;
    }
    if let Some(network) = args.network {
        cfg.network = network;
    }
    if let Some(gpu_threads) = args.gpu_threads {
        cfg.gpu_threads = gpu_threads;
    }
    if let Some(cpu_threads) = args.cpu_threads {
        cfg.cpu_threads = cpu_threads;
    }
    if args.eco {
        cfg.performance_mode = PerformanceMode::EcoMode.to_string();
    }

    if cfg.bitcoin_address.trim().is_empty() {
        eprintln!("❌ Error: a Bitcoin address is required. Use --address YOUR_ADDRESS");
        std::process::exit(1);
    }
    if let Err(e) = config::validate_bitcoin_address(&cfg.bitcoin_address, &cfg.network) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    // Remember the merged settings for the next run
    if let Err(e) = config::save_config(&cfg) {
        info!("Could not persist config: {}", e);
    }

    info!("🚀 Starting SoloMiner");
    info!("📍 Pool: {}:{} ({})", cfg.host, cfg.port, cfg.network);
    info!("💳 Address: {}", cfg.bitcoin_address);
    info!("👷 Worker: {}", cfg.worker_name);

    let engine = MiningEngine::new();
    engine.set_thread_config(cfg.gpu_threads, cfg.cpu_threads);
    match cfg.performance_mode.parse::<PerformanceMode>() {
        Ok(mode) => engine.set_performance_mode(mode),
        Err(e) => info!("Ignoring configured performance mode: {}", e),
    }

    if let Err(e) = engine
        .start(&cfg.host, cfg.port, &cfg.bitcoin_address, &cfg.worker_name, &cfg.network)
        .await
    {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    // Observer: one coherent snapshot every 30 seconds
    let observer = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            let snap = observer.snapshot();
            info!(
                "📊 {} | {} (peak {}) | diff {} | shares {}✅/{}❌/{} sent | jobs {} | best {} bits | up {}",
                snap.status,
                FormatUtils::format_hashrate(snap.hashrate),
                FormatUtils::format_hashrate(snap.peak_hashrate),
                snap.difficulty,
                snap.shares_accepted,
                snap.shares_rejected,
                snap.shares_submitted,
                snap.jobs_received,
                snap.best_share_bits,
                FormatUtils::format_uptime(Duration::from_secs(snap.uptime_seconds as u64)),
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("🛑 Ctrl-C received, stopping...");
    engine.stop().await;
    info!("👋 Stopped cleanly");

    Ok(())
}

// Changelog:
// - v1.3.0 (2025-07-28): Config-backed defaults with CLI override; status
//   line includes best share bits.
// - v1.0.0 (2025-06-30): Initial CLI entry point.
