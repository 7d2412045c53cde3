//! Headless harness - run the automaton without a window and report diagnostics
//! Run with: cargo run --bin headless --release -- --steps 500

use anyhow::{Context, Result};
use clap::Parser;
use power_automaton::config::SimulationConfig;
use power_automaton::diagnostics;
use power_automaton::simulation::Simulation;
use power_automaton::ticker::Ticker;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "headless", about = "Run the power automaton without a window")]
struct Cli {
    /// TOML configuration file (browser defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of scheduled steps to run
    #[arg(short, long, default_value_t = 1000)]
    steps: u64,

    /// Fixed RNG seed, overrides the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Delay between steps in milliseconds, overrides the configuration
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Log a grid summary every N steps (0 disables)
    #[arg(long, default_value_t = 100)]
    report_every: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    power_automaton::debug::init();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.tick_interval_ms = interval_ms;
    }

    let mut sim = Simulation::new(config)?;

    if cli.report_every > 0 {
        let report_every = cli.report_every;
        let mut observed = 0u64;
        sim.on_grid_changed(move |grid| {
            // First notification is the freshly initialized grid
            if observed % report_every == 0 {
                diagnostics::summarize(grid).log_report(observed);
            }
            observed += 1;
        });
    }

    sim.initialize()?;
    sim.start()?;

    let mut ticker = Ticker::for_simulation(&sim);
    let fired = ticker.run_blocking(&mut sim, Some(cli.steps))?;

    let grid = sim.grid().context("simulation lost its grid")?;
    let summary = diagnostics::summarize(grid);
    summary.log_report(sim.steps());
    tracing::info!(fired, "run complete");
    power_automaton::debug::print_stats();

    if !summary.is_consistent() {
        anyhow::bail!(
            "invariant violated: {} conservation, {} bounds",
            summary.conservation_violations,
            summary.bound_violations
        );
    }

    Ok(())
}
