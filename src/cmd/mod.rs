pub mod build;
pub mod config;
pub mod filter;
pub mod plan;

use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use threadreel::{Settings, Thread};

/// Settings and thread for a subcommand.
fn load_inputs(thread: &Path, config: Option<&Path>) -> Result<(Settings, Thread)> {
    let settings = Settings::load(config).context("failed to load settings")?;
    let thread = Thread::load(thread)
        .with_context(|| format!("failed to load thread {}", thread.display()))?;
    Ok((settings, thread))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}
