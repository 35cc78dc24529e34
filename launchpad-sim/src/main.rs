//! Aethernova Launchpad simulator.
//!
//! Replays a scenario (pool config, whitelist, purchase tape) through the pool
//! engine on an in-memory ledger, then claims for every buyer and withdraws.
//! The JSON report goes to stdout; logs go to stderr.

#![forbid(unsafe_code)]

mod runner;
mod scenario;
mod telemetry;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

/// Process configuration (CLI + ENV).
#[derive(Clone, Debug, Parser)]
#[command(name = "aethernova-launchpad-sim", version)]
struct Cli {
    /// Scenario file (TOML, YAML or JSON).
    #[arg(long, env = "LAUNCHPAD_SCENARIO")]
    scenario: PathBuf,

    /// EnvFilter directive, e.g. "info,launchpad=debug".
    #[arg(long, env = "LAUNCHPAD_LOG", default_value = "info")]
    log_filter: String,

    /// Emit logs as JSON.
    #[arg(long, env = "LAUNCHPAD_LOG_JSON")]
    json: bool,

    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(&telemetry::LoggingConfig {
        env_filter: Some(cli.log_filter.clone()),
        json: cli.json,
        ..Default::default()
    })?;

    let scenario = scenario::load(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario.display()))?;
    info!(scenario = %scenario.name, purchases = scenario.purchases.len(), "scenario loaded");

    let report = runner::run(&scenario)?;
    let out = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");
    Ok(())
}
