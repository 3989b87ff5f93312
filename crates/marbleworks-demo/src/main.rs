//! Headless runner: loads a level, runs it, and reports how well the tracker
//! knew each ball by the time a sink consumed it.
//!
//! Run with: `cargo run --package marbleworks-demo -- crates/marbleworks-demo/levels/sorting_line.ron`

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use marbleworks_core::engine::Engine;
use marbleworks_core::event::SimEvent;
use marbleworks_core::fixed::to_seconds;
use marbleworks_data::load_level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "marbleworks")]
#[command(about = "Run a Marbleworks level headless")]
struct Cli {
    /// Level file (.ron, .toml or .json)
    level: PathBuf,

    /// Steps to run. Defaults to the level's simulation duration.
    #[arg(long)]
    ticks: Option<u64>,

    /// Run the level twice and compare state hashes
    #[arg(long)]
    check_determinism: bool,
}

/// What one run produced.
struct RunSummary {
    ticks: u64,
    hash: u64,
    consumed: Vec<(f64, String, f64)>,
    lost: usize,
    dropped_events: u64,
}

fn run(path: &Path, ticks: Option<u64>) -> anyhow::Result<RunSummary> {
    let loaded = load_level(path).with_context(|| format!("loading {}", path.display()))?;
    let ticks = ticks.unwrap_or_else(|| loaded.steps());
    let strategy = loaded.strategy();
    let mut engine = Engine::new(loaded.level, strategy).context("setting up engine")?;

    let mut consumed = Vec::new();
    let mut lost = 0;
    for _ in 0..ticks {
        engine.step()?;
        for event in engine.drain_events() {
            match event {
                SimEvent::BallConsumed {
                    truth,
                    belief_in_truth,
                    time,
                    ..
                } => consumed.push((to_seconds(time), truth.to_string(), belief_in_truth)),
                SimEvent::BallLost { .. } => lost += 1,
                _ => {}
            }
        }
    }

    Ok(RunSummary {
        ticks: engine.tick(),
        hash: engine.state_hash(),
        consumed,
        lost,
        dropped_events: engine.events().dropped_count(),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!(level = %cli.level.display(), "starting run");

    let summary = run(&cli.level, cli.ticks)?;

    println!("{:>8}  {:<8}  {:>6}", "time", "truth", "belief");
    for (time, truth, belief) in &summary.consumed {
        println!("{time:>8.2}  {truth:<8}  {belief:>6.3}");
    }
    let mean = if summary.consumed.is_empty() {
        0.0
    } else {
        summary.consumed.iter().map(|(_, _, b)| b).sum::<f64>() / summary.consumed.len() as f64
    };
    println!(
        "\n{} ticks, {} consumed, {} lost, mean belief in truth {mean:.3}",
        summary.ticks,
        summary.consumed.len(),
        summary.lost
    );
    println!("state hash = {:#018x}", summary.hash);
    if summary.dropped_events > 0 {
        tracing::warn!(dropped = summary.dropped_events, "event buffer overflowed");
    }

    if cli.check_determinism {
        let again = run(&cli.level, cli.ticks)?;
        if again.hash != summary.hash {
            bail!(
                "determinism check failed: {:#018x} != {:#018x}",
                summary.hash,
                again.hash
            );
        }
        println!("Determinism: PASS (hashes match)");
    }

    Ok(())
}
