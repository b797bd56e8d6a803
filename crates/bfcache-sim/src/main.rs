//! `bfcache-sim [SCENARIO.toml] [--json]`
//!
//! Replays a scripted browsing session against a page with an instant
//! network and prints the resulting back/forward list and cache state.

mod scenario;
mod sim;

use std::path::PathBuf;

use anyhow::{Result, bail};

use scenario::{DEMO, Scenario};
use sim::Simulator;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut path: Option<PathBuf> = None;
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "-h" | "--help" => {
                println!("usage: bfcache-sim [SCENARIO.toml] [--json]");
                return Ok(());
            }
            other if other.starts_with('-') => bail!("unknown option {other}"),
            other => {
                if path.is_some() {
                    bail!("more than one scenario given");
                }
                path = Some(PathBuf::from(other));
            }
        }
    }

    let scenario = match &path {
        Some(path) => Scenario::load(path)?,
        None => {
            log::info!("no scenario given, running the built-in demo");
            Scenario::from_toml_str(DEMO)?
        }
    };

    let mut sim = Simulator::new(scenario.config);
    for (index, step) in scenario.steps.iter().enumerate() {
        if let Err(e) = sim.apply(step) {
            bail!("step {}: {e:#}", index + 1);
        }
    }

    let report = sim.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
