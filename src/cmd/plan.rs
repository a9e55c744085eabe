use std::path::Path;

use anyhow::Result;

use threadreel::{Collaborators, ReelPipeline};

use super::{load_inputs, seeded_rng};

pub fn cmd_plan(thread: &Path, config: Option<&Path>, seed: Option<u64>) -> Result<()> {
    let (settings, thread) = load_inputs(thread, config)?;

    let collaborators = Collaborators::from_settings(&settings)?;
    let pipeline = ReelPipeline::new(settings, collaborators);
    let timeline = pipeline.plan(&thread, &mut seeded_rng(seed))?;

    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}
