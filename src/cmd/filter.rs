use std::path::Path;

use anyhow::Result;

use threadreel::filter;

use super::load_inputs;

pub fn cmd_filter(thread: &Path, config: Option<&Path>) -> Result<()> {
    let (settings, thread) = load_inputs(thread, config)?;
    let outcome = filter(&thread.comments, &settings.filter_config());

    println!("🔎 {} ({} comments)\n", thread.title, thread.comments.len());

    for comment in &outcome.accepted {
        println!("✅ {} accepted ({} chars)", comment.id, comment.raw_len());
    }
    for (comment, reason) in &outcome.rejected {
        println!("❌ {} rejected: {reason}", comment.id);
    }

    let examined = outcome.accepted.len() + outcome.rejected.len();
    println!(
        "\n{} accepted, {} rejected, {} not examined",
        outcome.accepted.len(),
        outcome.rejected.len(),
        thread.comments.len().saturating_sub(examined)
    );

    Ok(())
}
