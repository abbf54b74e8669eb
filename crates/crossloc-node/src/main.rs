//! CrossLoc node: entry point.
//!
//! Runs atomic swaps between the two chains named in a TOML config file
//! (simulated in-process) and reports how each one ended.

mod config;
mod node;

use clap::Parser;
use crossloc_core::TimelockPreset;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::CrosslocConfig;
use node::CrosslocNode;

/// CrossLoc Node
#[derive(Parser, Debug)]
#[command(name = "crossloc-node", version, about = "CrossLoc cross-chain swap node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "crossloc.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the log format (text, json).
    #[arg(long)]
    log_format: Option<String>,

    /// Override the timelock preset (fast, standard, conservative).
    #[arg(long, value_parser = parse_preset)]
    preset: Option<TimelockPreset>,

    /// Number of concurrent swaps to run.
    #[arg(long)]
    swaps: Option<usize>,

    /// Never reveal the secret, so every swap takes the refund path.
    #[arg(long)]
    withhold_secret: bool,

    /// Keep swap records as JSON files in this directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Chain seconds per wall-clock second on the simulated chains.
    #[arg(long)]
    clock_speed: Option<u64>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn parse_preset(s: &str) -> Result<TimelockPreset, String> {
    TimelockPreset::ALL
        .into_iter()
        .find(|p| p.to_string() == s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown preset '{}', expected fast, standard or conservative", s))
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        init_tracing(args.log_level.as_deref().unwrap_or("info"), "text");
        let config = CrosslocConfig::default();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    // Load configuration
    let mut config = CrosslocConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(preset) = args.preset {
        config.swap.timelock_preset = preset;
    }
    if let Some(swaps) = args.swaps {
        config.demo.swaps = swaps;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = Some(data_dir);
    }
    if let Some(speed) = args.clock_speed {
        config.demo.clock_speed = speed;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("CrossLoc Node v{}", env!("CARGO_PKG_VERSION"));

    let swaps = config.demo.swaps;
    let node = CrosslocNode::new(config)?;
    node.start_clock();

    let mut ids = node.recover_pending().await?;
    ids.extend(node.start_swaps(swaps, args.withhold_secret).await?);

    tokio::select! {
        outcomes = node.wait_all(&ids) => {
            node.report(&outcomes);
            match node.prune_finished().await {
                Ok(removed) => tracing::debug!(removed, "finished swaps pruned"),
                Err(e) => tracing::warn!(error = %e, "failed to prune finished swaps"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("received shutdown signal");
        }
    }

    node.shutdown().await;
    tracing::info!("CrossLoc node exited cleanly");
    Ok(())
}
