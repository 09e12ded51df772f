//! tierscaled: the tierscale daemon.
//!
//! Loads a `tierscale.toml`, builds the scaling controller and drives it on
//! a fixed interval. The built-in backend is an in-process cluster
//! simulator, which makes the binary a harness for tuning the calculator
//! timings and the hysteresis window against a workload.
//!
//! # Usage
//!
//! ```text
//! tierscaled scaffold > tierscale.toml
//! tierscaled check-config --config tierscale.toml
//! tierscaled simulate --config tierscale.toml --ticks 200 --tick-delay-ms 0
//! ```

mod simulator;

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use tierscale_autoscale::{ControllerConfig, ScalingController};
use tierscale_core::TierscaleConfig;

use crate::simulator::{log_summary, SimulatedCluster};

#[derive(Parser)]
#[command(name = "tierscaled", about = "tierscale daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller against the built-in cluster simulator.
    Simulate {
        /// Path to tierscale.toml.
        #[arg(short, long, default_value = "tierscale.toml")]
        config: PathBuf,

        /// Number of ticks to simulate.
        #[arg(long, default_value = "100")]
        ticks: u64,

        /// Wall-clock delay between ticks in milliseconds. Defaults to
        /// `controller.interval`.
        #[arg(long)]
        tick_delay_ms: Option<u64>,
    },
    /// Parse and validate a config file, then print the effective values.
    CheckConfig {
        #[arg(short, long, default_value = "tierscale.toml")]
        config: PathBuf,
    },
    /// Print a starter tierscale.toml.
    Scaffold,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Simulate {
            config,
            ticks,
            tick_delay_ms,
        } => run_simulation(&config, ticks, tick_delay_ms).await,
        Command::CheckConfig { config } => check_config(&config),
        Command::Scaffold => {
            print!("{}", TierscaleConfig::scaffold().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,tierscaled=debug,tierscale_autoscale=debug")
    });

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<TierscaleConfig> {
    TierscaleConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let interval = config.controller.interval()?;
    let calc = &config.calculator;

    println!("config OK: {}", path.display());
    println!(
        "  calculator: target={} spot_target={} run={} spinup={}",
        calc.target, calc.spot_target, calc.run, calc.spinup
    );
    println!(
        "  controller: window={} max_fast={} interval={:?}",
        config.controller.window, config.controller.max_fast, interval
    );
    match &config.simulation {
        Some(sim) => println!(
            "  simulation: initial=({}) backlog={} arrivals/tick={} bursts={} fail_every={}",
            sim.initial,
            sim.initial_backlog,
            sim.arrivals_per_tick,
            sim.bursts.len(),
            sim.fail_every
        ),
        None => println!("  simulation: defaults"),
    }
    Ok(())
}

async fn run_simulation(
    path: &Path,
    ticks: u64,
    tick_delay_ms: Option<u64>,
) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let interval = match tick_delay_ms {
        Some(ms) => Duration::from_millis(ms),
        None => config.controller.interval()?,
    };

    let cluster = SimulatedCluster::new(
        config.calculator,
        config.simulation.clone().unwrap_or_default(),
    );
    let controller_config = ControllerConfig::from_settings(config.calculator, &config.controller)?;
    let mut controller = ScalingController::new(cluster, controller_config)?;

    info!(path = %path.display(), ticks, "simulation starting");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would stop the loop; run until done instead.
                warn!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        }
    });

    // ── Control loop ───────────────────────────────────────────

    controller
        .run_with(interval, shutdown_rx, |cluster, outcome| {
            cluster.record(outcome);
            cluster.advance();
            if cluster.ticks() >= ticks {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

    log_summary(&controller.backend().summary());
    Ok(())
}
